//! The OS hotkey facade consumed by the listener.

use crate::event::Notification;
use crate::hotkey::Hotkey;
use crate::registry::HotKeyId;
use anyhow::Result;
use std::ops::RangeInclusive;

/// Ids accepted by `RegisterHotKey` for application-defined hotkeys.
pub const WIN32_HOTKEY_IDS: RangeInclusive<i32> = 0x0000..=0xBFFF;

/// Hotkey primitives of the host OS.
///
/// Every method is called from the listener thread only, and the value is
/// built on that thread, so implementations may hold thread-affine state.
pub trait Platform {
    /// Retrieve at most one pending notification without blocking.
    fn poll_notification(&mut self) -> Option<Notification>;

    /// Register `hotkey` with the OS under `id`.
    ///
    /// Fails when the combination is owned by another process or the OS
    /// otherwise rejects it.
    fn install_hotkey(&mut self, id: HotKeyId, hotkey: &Hotkey) -> Result<()>;

    /// Unregister the hotkey installed under `id`.
    fn remove_hotkey(&mut self, id: HotKeyId) -> Result<()>;
}
