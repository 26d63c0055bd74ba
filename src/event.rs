//! Notifications retrieved from the platform's message queue.

use crate::registry::HotKeyId;

/// One event retrieved by [`Platform::poll_notification`](crate::Platform::poll_notification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A registered hotkey was triggered.
    HotKey(HotKeyId),
    /// Any other message that landed on the listener thread's queue,
    /// identified by its raw message type.
    Other(u32),
}

impl Notification {
    /// The hotkey id carried by a trigger event.
    pub fn hotkey_id(&self) -> Option<HotKeyId> {
        match self {
            Notification::HotKey(id) => Some(*id),
            Notification::Other(_) => None,
        }
    }
}
