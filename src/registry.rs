//! Hotkey id allocation and the pending/active binding collections.

use crate::hotkey::Hotkey;
use crate::platform::Platform;
use anyhow::{anyhow, bail, Result};
use log::debug;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Random draws attempted before falling back to a linear probe.
const RANDOM_DRAWS: usize = 64;

/// Action run when a hotkey fires.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Identifies one registered binding for as long as it is pending or active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotKeyId(i32);

impl HotKeyId {
    /// Wrap an id reported by the OS.
    pub const fn from_raw(raw: i32) -> Self {
        HotKeyId(raw)
    }

    /// The id handed to the OS.
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for HotKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A key combination together with its action.
#[derive(Clone)]
pub struct Binding {
    pub hotkey: Hotkey,
    pub callback: Callback,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("hotkey", &self.hotkey)
            .finish_non_exhaustive()
    }
}

/// A registration or removal the OS refused.
///
/// Failures are never retried. The binding either never becomes active
/// (`Install`) or stays active (`Remove`).
#[derive(Debug)]
pub enum HotkeyFailure {
    Install {
        id: HotKeyId,
        hotkey: Hotkey,
        reason: anyhow::Error,
    },
    Remove {
        id: HotKeyId,
        reason: anyhow::Error,
    },
}

impl HotkeyFailure {
    pub fn id(&self) -> HotKeyId {
        match self {
            HotkeyFailure::Install { id, .. } | HotkeyFailure::Remove { id, .. } => *id,
        }
    }
}

impl std::fmt::Display for HotkeyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyFailure::Install { id, hotkey, reason } => {
                write!(f, "Dropping hotkey {} ({}): {:#}", hotkey, id, reason)
            }
            HotkeyFailure::Remove { id, reason } => {
                write!(f, "Hotkey {} stays registered: {:#}", id, reason)
            }
        }
    }
}

/// Result of an unregister request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unregistered {
    /// Removed before it ever reached the OS.
    CancelledPending,
    /// Queued for removal on the next drain.
    Scheduled,
    /// Being installed right now; removed once the install lands.
    AfterInstall,
    AlreadyScheduled,
    /// Not pending or active.
    Unknown,
}

/// The binding collections, guarded together by the service.
///
/// Invariant: an id is in at most one of `pending_register`, `installing`
/// and `active`. It is in `pending_unregister` or `removing` only while it
/// is also in `active`, and in `unregister_after_install` only while it is
/// in `installing`.
///
/// `installing` and `removing` hold ids whose OS call is in flight with the
/// lock released, so callers are never blocked by a drain.
pub(crate) struct Registry {
    id_range: RangeInclusive<i32>,
    pending_register: HashMap<HotKeyId, Binding>,
    pending_unregister: Vec<HotKeyId>,
    active: HashMap<HotKeyId, Binding>,
    installing: HashSet<HotKeyId>,
    unregister_after_install: HashSet<HotKeyId>,
    removing: HashSet<HotKeyId>,
}

impl Registry {
    pub fn new(id_range: RangeInclusive<i32>) -> Self {
        Self {
            id_range,
            pending_register: HashMap::new(),
            pending_unregister: Vec::new(),
            active: HashMap::new(),
            installing: HashSet::new(),
            unregister_after_install: HashSet::new(),
            removing: HashSet::new(),
        }
    }

    fn is_taken(&self, id: HotKeyId) -> bool {
        self.pending_register.contains_key(&id)
            || self.installing.contains(&id)
            || self.active.contains_key(&id)
    }

    /// Pick an id that is neither pending, being installed, nor active.
    pub fn allocate_id(&self) -> Result<HotKeyId> {
        let start = i64::from(*self.id_range.start());
        let end = i64::from(*self.id_range.end());
        if start > end {
            bail!("Empty hotkey id range {}..={}", start, end);
        }

        let capacity = end - start + 1;
        let in_use =
            (self.pending_register.len() + self.installing.len() + self.active.len()) as i64;
        if in_use >= capacity {
            bail!(
                "Hotkey id range {}..={} exhausted ({} ids in use)",
                start,
                end,
                in_use
            );
        }

        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_DRAWS {
            let id = HotKeyId(rng.gen_range(self.id_range.clone()));
            if !self.is_taken(id) {
                return Ok(id);
            }
        }

        // Densely used range: probe linearly from a random offset.
        let offset = rng.gen_range(0..capacity);
        (0..capacity)
            .map(|step| HotKeyId((start + (offset + step) % capacity) as i32))
            .find(|&id| !self.is_taken(id))
            .ok_or_else(|| anyhow!("Hotkey id range {}..={} exhausted", start, end))
    }

    pub fn register(&mut self, hotkey: Hotkey, callback: Callback) -> Result<HotKeyId> {
        let id = self.allocate_id()?;
        self.pending_register
            .insert(id, Binding { hotkey, callback });
        Ok(id)
    }

    pub fn unregister(&mut self, id: HotKeyId) -> Unregistered {
        if self.pending_register.remove(&id).is_some() {
            return Unregistered::CancelledPending;
        }
        if self.installing.contains(&id) {
            return if self.unregister_after_install.insert(id) {
                Unregistered::AfterInstall
            } else {
                Unregistered::AlreadyScheduled
            };
        }
        if !self.active.contains_key(&id) {
            return Unregistered::Unknown;
        }
        if self.pending_unregister.contains(&id) || self.removing.contains(&id) {
            return Unregistered::AlreadyScheduled;
        }
        self.pending_unregister.push(id);
        Unregistered::Scheduled
    }

    /// Move pending registrations in flight and hand them to the caller.
    fn take_registrations(&mut self) -> Vec<(HotKeyId, Binding)> {
        let taken: Vec<_> = self.pending_register.drain().collect();
        self.installing.extend(taken.iter().map(|(id, _)| *id));
        taken
    }

    fn commit_install(
        &mut self,
        id: HotKeyId,
        binding: Binding,
        result: Result<()>,
    ) -> Option<HotkeyFailure> {
        self.installing.remove(&id);
        let unregister = self.unregister_after_install.remove(&id);
        match result {
            Ok(()) => {
                debug!("Registered hotkey {} ({})", binding.hotkey, id);
                self.active.insert(id, binding);
                if unregister {
                    self.pending_unregister.push(id);
                }
                None
            }
            Err(reason) => Some(HotkeyFailure::Install {
                id,
                hotkey: binding.hotkey,
                reason,
            }),
        }
    }

    /// Move queued removals in flight and hand them to the caller.
    fn take_removals(&mut self) -> Vec<HotKeyId> {
        let taken: Vec<_> = self.pending_unregister.drain(..).collect();
        self.removing.extend(taken.iter().copied());
        taken
    }

    fn commit_removal(&mut self, id: HotKeyId, result: Result<()>) -> Option<HotkeyFailure> {
        self.removing.remove(&id);
        match result {
            Ok(()) => {
                debug!("Unregistered hotkey {}", id);
                self.active.remove(&id);
                None
            }
            Err(reason) => Some(HotkeyFailure::Remove { id, reason }),
        }
    }

    /// Drop registrations that were never installed, returning how many.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.pending_register.len();
        self.pending_register.clear();
        count
    }

    /// Queue every active id for removal.
    pub fn schedule_all_active(&mut self) {
        for id in self.active.keys() {
            if !self.pending_unregister.contains(id) && !self.removing.contains(id) {
                self.pending_unregister.push(*id);
            }
        }
    }

    pub fn active_binding(&self, id: HotKeyId) -> Option<Binding> {
        self.active.get(&id).cloned()
    }

    pub fn is_active(&self, id: HotKeyId) -> bool {
        self.active.contains_key(&id)
    }

    /// Requested but not yet installed, including an install in flight.
    pub fn is_pending(&self, id: HotKeyId) -> bool {
        self.pending_register.contains_key(&id) || self.installing.contains(&id)
    }

    #[cfg(test)]
    pub fn active_ids(&self) -> std::collections::BTreeSet<HotKeyId> {
        self.active.keys().copied().collect()
    }
}

/// Install every pending registration. Refused ones are dropped.
///
/// The OS is called with `registry` unlocked.
pub(crate) fn install_pending<P: Platform>(
    registry: &Mutex<Registry>,
    platform: &mut P,
) -> Vec<HotkeyFailure> {
    let taken = registry.lock().take_registrations();
    let results: Vec<_> = taken
        .into_iter()
        .map(|(id, binding)| {
            let result = platform.install_hotkey(id, &binding.hotkey);
            (id, binding, result)
        })
        .collect();

    let mut registry = registry.lock();
    results
        .into_iter()
        .filter_map(|(id, binding, result)| registry.commit_install(id, binding, result))
        .collect()
}

/// Remove every id queued for removal. Refused ones stay active.
///
/// The OS is called with `registry` unlocked.
pub(crate) fn remove_pending<P: Platform>(
    registry: &Mutex<Registry>,
    platform: &mut P,
) -> Vec<HotkeyFailure> {
    let taken = registry.lock().take_removals();
    let results: Vec<_> = taken
        .into_iter()
        .map(|id| (id, platform.remove_hotkey(id)))
        .collect();

    let mut registry = registry.lock();
    results
        .into_iter()
        .filter_map(|(id, result)| registry.commit_removal(id, result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::parse_hotkey;
    use crate::mock::MockPlatform;
    use crate::platform::WIN32_HOTKEY_IDS;
    use std::collections::{BTreeSet, HashSet};

    fn noop() -> Callback {
        Arc::new(|| {})
    }

    fn hotkey(s: &str) -> Hotkey {
        parse_hotkey(s).unwrap()
    }

    fn shared(range: RangeInclusive<i32>) -> Mutex<Registry> {
        Mutex::new(Registry::new(range))
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = Registry::new(WIN32_HOTKEY_IDS);
        let mut seen = HashSet::new();
        for _ in 0..5000 {
            let id = registry.register(hotkey("Alt+1"), noop()).unwrap();
            assert!(WIN32_HOTKEY_IDS.contains(&id.as_raw()));
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }

    #[test]
    fn test_dense_range_fills_then_fails() {
        let mut registry = Registry::new(0..=7);
        let ids: HashSet<_> = (0..8)
            .map(|_| registry.register(hotkey("F1"), noop()).unwrap())
            .collect();
        assert_eq!(ids.len(), 8);
        assert!(registry.register(hotkey("F1"), noop()).is_err());
    }

    #[test]
    fn test_ids_reusable_after_cancel() {
        let mut registry = Registry::new(3..=3);
        let id = registry.register(hotkey("F1"), noop()).unwrap();
        assert_eq!(id.as_raw(), 3);
        assert_eq!(registry.unregister(id), Unregistered::CancelledPending);
        assert_eq!(registry.register(hotkey("F2"), noop()).unwrap(), id);
    }

    #[test]
    fn test_in_flight_install_keeps_id_reserved() {
        let mut registry = Registry::new(3..=3);
        let id = registry.register(hotkey("F1"), noop()).unwrap();
        let taken = registry.take_registrations();
        assert_eq!(taken.len(), 1);

        assert!(registry.is_pending(id));
        assert!(registry.allocate_id().is_err());
    }

    #[test]
    fn test_unregister_during_install_removes_after_commit() {
        let mut registry = Registry::new(WIN32_HOTKEY_IDS);
        let id = registry.register(hotkey("Alt+1"), noop()).unwrap();
        let (_, binding) = registry.take_registrations().pop().unwrap();

        assert_eq!(registry.unregister(id), Unregistered::AfterInstall);
        assert_eq!(registry.unregister(id), Unregistered::AlreadyScheduled);
        assert!(registry.commit_install(id, binding, Ok(())).is_none());

        assert!(registry.is_active(id));
        assert_eq!(registry.pending_unregister, vec![id]);
    }

    #[test]
    fn test_unregister_during_failed_install_is_forgotten() {
        let mut registry = Registry::new(WIN32_HOTKEY_IDS);
        let id = registry.register(hotkey("Alt+1"), noop()).unwrap();
        let (_, binding) = registry.take_registrations().pop().unwrap();
        registry.unregister(id);

        let failure = registry.commit_install(id, binding, Err(anyhow!("taken")));
        assert!(failure.is_some());
        assert!(registry.pending_unregister.is_empty());
        assert!(registry.unregister_after_install.is_empty());
        assert_eq!(registry.unregister(id), Unregistered::Unknown);
    }

    #[test]
    fn test_unregister_during_removal_is_not_queued_again() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let id = registry.lock().register(hotkey("Alt+1"), noop()).unwrap();
        install_pending(&registry, &mut platform.clone());

        let mut guard = registry.lock();
        guard.unregister(id);
        let taken = guard.take_removals();
        assert_eq!(taken, vec![id]);
        assert_eq!(guard.unregister(id), Unregistered::AlreadyScheduled);
        guard.schedule_all_active();
        assert!(guard.pending_unregister.is_empty());
    }

    #[test]
    fn test_empty_range_fails() {
        #[allow(clippy::reversed_empty_ranges)]
        let registry = Registry::new(5..=4);
        assert!(registry.allocate_id().is_err());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut registry = Registry::new(WIN32_HOTKEY_IDS);
        assert_eq!(
            registry.unregister(HotKeyId::from_raw(42)),
            Unregistered::Unknown
        );
        assert!(registry.pending_unregister.is_empty());
    }

    #[test]
    fn test_unregister_pending_skips_install() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let id = registry.lock().register(hotkey("Alt+1"), noop()).unwrap();

        assert_eq!(registry.lock().unregister(id), Unregistered::CancelledPending);
        assert!(install_pending(&registry, &mut platform.clone()).is_empty());

        assert!(platform.state().install_calls.is_empty());
        assert!(!registry.lock().is_active(id));
        assert_eq!(registry.lock().unregister(id), Unregistered::Unknown);
    }

    #[test]
    fn test_drain_activates_remaining_registrations() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let ids: Vec<_> = ["Alt+1", "Alt+2", "Alt+3", "Alt+4"]
            .iter()
            .map(|s| registry.lock().register(hotkey(s), noop()).unwrap())
            .collect();
        registry.lock().unregister(ids[1]);
        registry.lock().unregister(ids[3]);

        assert!(install_pending(&registry, &mut platform.clone()).is_empty());

        let expected: BTreeSet<_> = [ids[0], ids[2]].into_iter().collect();
        assert_eq!(registry.lock().active_ids(), expected);
        assert_eq!(
            platform.state().installed.keys().copied().collect::<BTreeSet<_>>(),
            expected
        );
    }

    #[test]
    fn test_conflicting_install_is_dropped() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let first = registry.lock().register(hotkey("Alt+1"), noop()).unwrap();
        assert!(install_pending(&registry, &mut platform.clone()).is_empty());

        let second = registry.lock().register(hotkey("Alt+1"), noop()).unwrap();
        let failures = install_pending(&registry, &mut platform.clone());

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], HotkeyFailure::Install { id, .. } if id == second));
        let mut registry = registry.lock();
        assert!(registry.is_active(first));
        assert!(!registry.is_active(second));
        assert!(!registry.is_pending(second));
        assert_eq!(registry.unregister(second), Unregistered::Unknown);
    }

    #[test]
    fn test_removal_failure_keeps_binding_active() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let id = registry.lock().register(hotkey("Ctrl+F5"), noop()).unwrap();
        install_pending(&registry, &mut platform.clone());

        platform.state().reject_removals = true;
        assert_eq!(registry.lock().unregister(id), Unregistered::Scheduled);
        let failures = remove_pending(&registry, &mut platform.clone());

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id(), id);
        assert!(registry.lock().is_active(id));
        assert!(registry.lock().pending_unregister.is_empty());

        // Not retried on the next drain.
        platform.state().reject_removals = false;
        assert!(remove_pending(&registry, &mut platform.clone()).is_empty());
        assert_eq!(platform.state().remove_calls, vec![id]);
    }

    #[test]
    fn test_unregister_twice_queues_once() {
        let platform = MockPlatform::new();
        let registry = shared(WIN32_HOTKEY_IDS);
        let id = registry.lock().register(hotkey("Alt+Q"), noop()).unwrap();
        install_pending(&registry, &mut platform.clone());

        assert_eq!(registry.lock().unregister(id), Unregistered::Scheduled);
        assert_eq!(registry.lock().unregister(id), Unregistered::AlreadyScheduled);
        registry.lock().schedule_all_active();
        assert_eq!(registry.lock().pending_unregister, vec![id]);

        assert!(remove_pending(&registry, &mut platform.clone()).is_empty());
        assert!(!registry.lock().is_active(id));
        assert_eq!(platform.state().remove_calls, vec![id]);
    }
}
