//! In-memory platform used by the unit tests.

use crate::event::Notification;
use crate::hotkey::Hotkey;
use crate::platform::Platform;
use crate::registry::HotKeyId;
use anyhow::{anyhow, bail, Result};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub notifications: VecDeque<Notification>,
    pub installed: HashMap<HotKeyId, Hotkey>,
    pub install_calls: Vec<HotKeyId>,
    pub remove_calls: Vec<HotKeyId>,
    pub reject_removals: bool,
    /// Simulates a slow OS call. The state lock is not held meanwhile.
    pub install_delay: Option<Duration>,
}

/// Behaves like the OS hotkey table: one owner per key combination.
/// Clones share state so tests can inspect what the listener did.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn push(&self, notification: Notification) {
        self.state.lock().notifications.push_back(notification);
    }
}

impl Platform for MockPlatform {
    fn poll_notification(&mut self) -> Option<Notification> {
        self.state.lock().notifications.pop_front()
    }

    fn install_hotkey(&mut self, id: HotKeyId, hotkey: &Hotkey) -> Result<()> {
        let delay = {
            let mut state = self.state.lock();
            state.install_calls.push(id);
            state.install_delay
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if state.installed.values().any(|owned| owned == hotkey) {
            bail!("{} is already registered", hotkey);
        }
        if state.installed.contains_key(&id) {
            bail!("id {} is already in use", id);
        }
        state.installed.insert(id, *hotkey);
        Ok(())
    }

    fn remove_hotkey(&mut self, id: HotKeyId) -> Result<()> {
        let mut state = self.state.lock();
        state.remove_calls.push(id);
        if state.reject_removals {
            bail!("removal rejected");
        }
        state
            .installed
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("id {} is not registered", id))
    }
}
