//! Physical key representation as a Windows virtual-key code.

use anyhow::{anyhow, Result};

/// Named keys outside the letter, digit and function-key ranges.
/// The first name for a code is the one used by `Display`.
const NAMED_KEYS: &[(&str, u32)] = &[
    ("Backspace", 0x08),
    ("Tab", 0x09),
    ("Enter", 0x0D),
    ("Return", 0x0D),
    ("Pause", 0x13),
    ("Escape", 0x1B),
    ("Esc", 0x1B),
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("PrintScreen", 0x2C),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("Del", 0x2E),
    ("ScrollLock", 0x91),
    ("Scroll_Lock", 0x91),
    ("Backtick", 0xC0),
    ("Grave", 0xC0),
];

const VK_0: u32 = 0x30;
const VK_A: u32 = 0x41;
const VK_NUMPAD0: u32 = 0x60;
const VK_F1: u32 = 0x70;
const FUNCTION_KEYS: u32 = 24;

/// A physical key, identified by its virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u32);

impl Key {
    /// Wrap a raw virtual-key code.
    pub const fn from_code(code: u32) -> Self {
        Key(code)
    }

    /// The virtual-key code handed to the OS.
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Parse a key from a string like "F8", "A", "1", "PageUp" or "0x31".
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();

        if let Some(hex) = upper.strip_prefix("0X") {
            return u32::from_str_radix(hex, 16)
                .map(Key)
                .map_err(|_| anyhow!("Invalid key code: {}", s));
        }

        let mut chars = upper.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_uppercase() {
                return Ok(Key(VK_A + (c as u32 - 'A' as u32)));
            }
            if c.is_ascii_digit() {
                return Ok(Key(VK_0 + (c as u32 - '0' as u32)));
            }
        }

        if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
            if (1..=FUNCTION_KEYS).contains(&n) {
                return Ok(Key(VK_F1 + n - 1));
            }
        }

        if let Some(n) = upper.strip_prefix("NUMPAD").and_then(|n| n.parse::<u32>().ok()) {
            if n <= 9 {
                return Ok(Key(VK_NUMPAD0 + n));
            }
        }

        NAMED_KEYS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
            .map(|&(_, code)| Key(code))
            .ok_or_else(|| anyhow!("Unknown key: {}", s))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.0;
        match code {
            c if (VK_A..VK_A + 26).contains(&c) => {
                write!(f, "{}", char::from(b'A' + (c - VK_A) as u8))
            }
            c if (VK_0..VK_0 + 10).contains(&c) => write!(f, "{}", c - VK_0),
            c if (VK_NUMPAD0..VK_NUMPAD0 + 10).contains(&c) => {
                write!(f, "Numpad{}", c - VK_NUMPAD0)
            }
            c if (VK_F1..VK_F1 + FUNCTION_KEYS).contains(&c) => write!(f, "F{}", c - VK_F1 + 1),
            c => match NAMED_KEYS.iter().find(|&&(_, named)| named == c) {
                Some((name, _)) => write!(f, "{}", name),
                None => write!(f, "0x{:02X}", c),
            },
        }
    }
}
