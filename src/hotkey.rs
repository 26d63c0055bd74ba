//! Key combination definition with optional modifiers.

use crate::key::Key;
use anyhow::{anyhow, Result};

/// Modifier keys that can be combined with a hotkey.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// The Windows / Super / Command key.
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    pub const ALT: Modifiers = Modifiers {
        alt: true,
        ..Modifiers::NONE
    };
    pub const META: Modifiers = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers {
            shift: self.shift || rhs.shift,
            ctrl: self.ctrl || rhs.ctrl,
            alt: self.alt || rhs.alt,
            meta: self.meta || rhs.meta,
        }
    }
}

/// A hotkey consisting of a key and optional modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl Hotkey {
    /// Create a new hotkey with the given modifiers.
    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Return a copy of this hotkey with the shift modifier added.
    pub fn with_shift(&self) -> Self {
        Self {
            key: self.key,
            modifiers: self.modifiers | Modifiers::SHIFT,
        }
    }
}

impl std::fmt::Display for Hotkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.modifiers.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.modifiers.alt {
            parts.push("Alt".to_string());
        }
        if self.modifiers.shift {
            parts.push("Shift".to_string());
        }
        if self.modifiers.meta {
            parts.push("Win".to_string());
        }
        parts.push(self.key.to_string());
        write!(f, "{}", parts.join("+"))
    }
}

impl std::str::FromStr for Hotkey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hotkey(s)
    }
}

/// Parse a hotkey string like "Alt+1" or "Ctrl+Shift+F8" into a Hotkey.
pub fn parse_hotkey(s: &str) -> Result<Hotkey> {
    if s.trim().is_empty() {
        return Err(anyhow!("Empty hotkey string"));
    }

    let parts: Vec<&str> = s.split('+').map(str::trim).collect();
    let mut modifiers = Modifiers::default();

    // Parse modifiers (all parts except the last one)
    for part in &parts[..parts.len() - 1] {
        match part.to_uppercase().as_str() {
            "SHIFT" => modifiers.shift = true,
            "CTRL" | "CONTROL" => modifiers.ctrl = true,
            "ALT" => modifiers.alt = true,
            "WIN" | "META" | "SUPER" | "CMD" => modifiers.meta = true,
            _ => return Err(anyhow!("Unknown modifier: {}", part)),
        }
    }

    // Parse the key (last part)
    let key_str = parts[parts.len() - 1];
    let key = Key::parse(key_str)?;

    Ok(Hotkey::with_modifiers(key, modifiers))
}
