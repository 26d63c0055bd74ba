//! The hotkey registration service and its listener thread.

use crate::event::Notification;
use crate::hotkey::Hotkey;
use crate::platform::{Platform, WIN32_HOTKEY_IDS};
use crate::registry::{
    install_pending, remove_pending, Binding, HotKeyId, HotkeyFailure, Registry, Unregistered,
};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep between listener iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

type FailureHook = Arc<dyn Fn(&HotkeyFailure) + Send + Sync + 'static>;

static SHARED: OnceLock<HotkeyService> = OnceLock::new();
static SHARED_INIT: Mutex<()> = parking_lot::const_mutex(());

/// Builder for creating a hotkey service.
pub struct HotkeyServiceBuilder {
    poll_interval: Duration,
    id_range: RangeInclusive<i32>,
    on_failure: Option<FailureHook>,
}

impl Default for HotkeyServiceBuilder {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            id_range: WIN32_HOTKEY_IDS,
            on_failure: None,
        }
    }
}

impl HotkeyServiceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// How long the listener sleeps between iterations.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Range hotkey ids are drawn from. Must fit what the OS accepts.
    pub fn id_range(mut self, range: RangeInclusive<i32>) -> Self {
        self.id_range = range;
        self
    }

    /// Observe registrations and removals the OS refused.
    ///
    /// Runs on the listener thread, so it should return quickly. Without a
    /// hook, failures are only logged.
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HotkeyFailure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// Start the service on the native platform.
    #[cfg(windows)]
    pub fn start(self) -> Result<HotkeyService> {
        self.start_with(|| Ok(crate::windows::Win32Platform::new()))
    }

    /// Start the service (unsupported platform stub).
    #[cfg(not(windows))]
    pub fn start(self) -> Result<HotkeyService> {
        bail!("Global hotkeys are not supported on this platform")
    }

    /// Start the service on a custom platform.
    ///
    /// `make_platform` runs on the listener thread, so the platform is
    /// created and used by that thread only.
    pub fn start_with<P, F>(self, make_platform: F) -> Result<HotkeyService>
    where
        P: Platform + 'static,
        F: FnOnce() -> Result<P> + Send + 'static,
    {
        if self.id_range.is_empty() {
            bail!("Empty hotkey id range {:?}", self.id_range);
        }

        let registry = Arc::new(Mutex::new(Registry::new(self.id_range)));
        let cancel = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let registry = Arc::clone(&registry);
            let cancel = Arc::clone(&cancel);
            let poll_interval = self.poll_interval;
            let on_failure = self.on_failure;
            thread::Builder::new()
                .name("hotkey-listener".to_string())
                .spawn(move || {
                    let platform = match make_platform() {
                        Ok(platform) => {
                            let _ = ready_tx.send(Ok(()));
                            platform
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let mut listener = Listener {
                        platform,
                        registry,
                        on_failure,
                    };
                    listener.run(&cancel, poll_interval);
                })
                .context("Failed to spawn hotkey listener thread")?
        };

        ready_rx
            .recv()
            .map_err(|_| anyhow!("Hotkey listener thread exited during startup"))?
            .context("Failed to initialise hotkey platform")?;

        Ok(HotkeyService {
            registry,
            cancel,
            thread: Mutex::new(Some(thread)),
        })
    }
}

/// Registers global hotkeys and runs their callbacks when triggered.
///
/// All OS interaction happens on one dedicated listener thread. `register`
/// and `unregister` only queue work for it and return immediately, so a
/// registration the OS refuses (e.g. the combination is owned by another
/// process) is never reported to the caller. It is logged, passed to the
/// [`on_failure`](HotkeyServiceBuilder::on_failure) hook if one is set, and
/// the binding never fires.
///
/// Dropping the service shuts it down.
///
/// # Example
///
/// ```no_run
/// use focus_hotkeys::{parse_hotkey, HotkeyService};
///
/// fn main() -> anyhow::Result<()> {
///     let service = HotkeyService::shared()?;
///     let id = service.register(parse_hotkey("Alt+1")?, || println!("Alt+1 pressed"))?;
///
///     // ...
///
///     service.unregister(id);
///     service.shutdown();
///     Ok(())
/// }
/// ```
pub struct HotkeyService {
    registry: Arc<Mutex<Registry>>,
    cancel: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HotkeyService {
    /// Create a builder for a standalone service.
    pub fn builder() -> HotkeyServiceBuilder {
        HotkeyServiceBuilder::new()
    }

    /// The process-wide service, started on first use.
    ///
    /// It is never dropped; call [`shutdown`](Self::shutdown) to release
    /// its hotkeys.
    pub fn shared() -> Result<&'static HotkeyService> {
        if let Some(service) = SHARED.get() {
            return Ok(service);
        }

        let _guard = SHARED_INIT.lock();
        if let Some(service) = SHARED.get() {
            return Ok(service);
        }
        let service = HotkeyServiceBuilder::new().start()?;
        Ok(SHARED.get_or_init(|| service))
    }

    /// Queue `hotkey` for registration and return its id.
    ///
    /// The binding becomes active on the listener's next iteration. Fails
    /// only when no free id is left.
    pub fn register<F>(&self, hotkey: Hotkey, callback: F) -> Result<HotKeyId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.cancel.load(Ordering::SeqCst) {
            warn!(
                "Hotkey service is shut down, {} will never be registered",
                hotkey
            );
        }

        let result = self.registry.lock().register(hotkey, Arc::new(callback));
        match &result {
            Ok(id) => debug!("Queued hotkey {} ({}) for registration", hotkey, id),
            Err(e) => error!("Cannot register hotkey {}: {:#}", hotkey, e),
        }
        result
    }

    /// Queue the removal of a hotkey. Unknown ids are ignored.
    pub fn unregister(&self, id: HotKeyId) {
        match self.registry.lock().unregister(id) {
            Unregistered::CancelledPending => {
                debug!("Cancelled hotkey {} before registration", id)
            }
            Unregistered::Scheduled => debug!("Queued hotkey {} for removal", id),
            Unregistered::AfterInstall => {
                debug!("Hotkey {} will be removed once its registration lands", id)
            }
            Unregistered::AlreadyScheduled => {
                debug!("Hotkey {} is already queued for removal", id)
            }
            Unregistered::Unknown => debug!("Ignoring removal of unknown hotkey {}", id),
        }
    }

    /// Whether `id` is currently registered with the OS.
    pub fn is_active(&self, id: HotKeyId) -> bool {
        self.registry.lock().is_active(id)
    }

    /// Whether `id` is still waiting for the listener to register it.
    pub fn is_pending(&self, id: HotKeyId) -> bool {
        self.registry.lock().is_pending(id)
    }

    /// Check if the listener thread is still running.
    pub fn is_running(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst)
            && self
                .thread
                .lock()
                .as_ref()
                .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the listener and unregister every active hotkey.
    ///
    /// Blocks until the listener thread has exited. Calling it again is a
    /// no-op.
    pub fn shutdown(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("Hotkey listener thread panicked");
            }
        }
    }
}

impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State owned by the listener thread.
struct Listener<P> {
    platform: P,
    registry: Arc<Mutex<Registry>>,
    on_failure: Option<FailureHook>,
}

impl<P: Platform> Listener<P> {
    fn run(&mut self, cancel: &AtomicBool, poll_interval: Duration) {
        info!("Listening for hotkeys");

        while !cancel.load(Ordering::SeqCst) {
            let notification = self.step();

            thread::sleep(poll_interval);

            if let Some(notification) = notification {
                self.dispatch(notification);
            }
        }

        self.release_all();
        info!("Stopped listening for hotkeys");
    }

    /// Poll for one notification, then apply queued registrations and
    /// removals.
    fn step(&mut self) -> Option<Notification> {
        let notification = self.platform.poll_notification();

        let mut failures = install_pending(&self.registry, &mut self.platform);
        failures.extend(remove_pending(&self.registry, &mut self.platform));
        self.report(failures);

        notification
    }

    /// Run the callback bound to a trigger notification. Returns whether a
    /// callback was started.
    fn dispatch(&self, notification: Notification) -> bool {
        let Some(id) = notification.hotkey_id() else {
            return false;
        };

        let Some(binding) = self.registry.lock().active_binding(id) else {
            debug!("Ignoring notification for unknown hotkey {}", id);
            return false;
        };

        debug!("Hotkey {} ({}) triggered", binding.hotkey, id);
        spawn_callback(id, binding);
        true
    }

    /// Final drain on shutdown: every active hotkey is removed once.
    fn release_all(&mut self) {
        {
            let mut registry = self.registry.lock();
            let discarded = registry.discard_pending();
            if discarded > 0 {
                warn!(
                    "Discarding {} hotkey registration(s) queued during shutdown",
                    discarded
                );
            }
            registry.schedule_all_active();
        }
        let failures = remove_pending(&self.registry, &mut self.platform);
        self.report(failures);
    }

    fn report(&self, failures: Vec<HotkeyFailure>) {
        for failure in failures {
            warn!("{}", failure);
            if let Some(hook) = &self.on_failure {
                if panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err() {
                    error!("Hotkey failure hook panicked");
                }
            }
        }
    }
}

/// Run a callback on its own thread without waiting for it.
fn spawn_callback(id: HotKeyId, binding: Binding) {
    let spawned = thread::Builder::new()
        .name(format!("hotkey-{}", id.as_raw()))
        .spawn(move || {
            let callback = binding.callback;
            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("Callback for hotkey {} ({}) panicked", binding.hotkey, id);
            }
        });

    if let Err(e) = spawned {
        error!("Failed to start callback for hotkey {}: {}", id, e);
    }
}
