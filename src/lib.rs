//! Global hotkeys for Windows, with a focus-or-restore window action.
//!
//! [`HotkeyService`] owns one background thread that does all hotkey work
//! with the OS. Windows delivers `WM_HOTKEY` only to the thread that called
//! `RegisterHotKey`, so registrations from any thread are queued and applied
//! by that listener. When a hotkey fires, its callback runs on a separate
//! thread so a slow or panicking callback never stalls the listener.
//!
//! # Features
//!
//! - **Non-blocking API** - `register`/`unregister` queue work and return immediately
//! - **Any thread** - callers never touch the OS hotkey table directly
//! - **Hotkey parsing** - `Alt+1`, `Ctrl+Shift+F8`, `Win+E` style combinations
//! - **Clean shutdown** - every registered hotkey is released exactly once
//! - **Focus action** - find a program by executable name and bring its main window forward
//!
//! # Example
//!
//! ```no_run
//! use focus_hotkeys::{focus, parse_hotkey, HotkeyService};
//!
//! fn main() -> anyhow::Result<()> {
//!     let service = HotkeyService::shared()?;
//!
//!     service.register(parse_hotkey("Alt+1")?, focus::focus_action("chrome.exe"))?;
//!     service.register(parse_hotkey("Alt+2")?, || println!("Alt+2 pressed"))?;
//!
//!     let mut line = String::new();
//!     std::io::stdin().read_line(&mut line)?;
//!
//!     // The shared service lives for the whole process; release its hotkeys explicitly
//!     service.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! A registration the OS refuses, usually because another process already
//! owns the combination, is not reported by `register`. The binding simply
//! never fires. Use [`HotkeyServiceBuilder::on_failure`] to observe these.

mod event;
pub mod focus;
mod hotkey;
mod key;
mod listener;
mod platform;
mod registry;

#[cfg(windows)]
mod windows;

#[cfg(test)]
mod mock;

pub use event::Notification;
pub use hotkey::{parse_hotkey, Hotkey, Modifiers};
pub use key::Key;
pub use listener::{HotkeyService, HotkeyServiceBuilder, DEFAULT_POLL_INTERVAL};
pub use platform::{Platform, WIN32_HOTKEY_IDS};
pub use registry::{HotKeyId, HotkeyFailure};

#[cfg(windows)]
pub use windows::Win32Platform;
