//! Polling engine.
//!
//! [`Engine`] owns a [`DeviceQuery`] port, the identity [`Registry`] and the
//! configuration, and turns fixed-cadence bitmask samples into listener callbacks.
//!
//! # Lifecycle
//! 1. [`Engine::new`] + listener registration through [`Engine::handle`].
//! 2. [`Engine::start`] spawns the polling thread, initializes the port *on that
//!    thread* and only returns once initialization succeeded or failed. A failure
//!    is returned as [`Error::Initialization`] and no `started` is emitted.
//!    [`Engine::run`] does the same on the calling thread and blocks.
//! 3. Each tick: dirty check → reconcile (if dirty) → per device: read state,
//!    diff, dispatch. Then sleep for the rest of the tick period.
//! 4. [`EngineHandle::stop`] clears the run flag from any thread. The current tick
//!    finishes, the port is terminated, then `closed` is emitted once.
//!
//! # Failure isolation
//! Nothing that happens inside a tick stops the loop. Port errors are logged and
//! the affected step is skipped (a failed state read keeps the previous state, a
//! failed list refresh is retried next tick). Panics escaping a tick are caught and
//! logged, and the next tick enumerates again; panics inside a listener are
//! contained per call by the dispatcher.
//!
//! # Per-controller polling
//! [`EngineHandle::set_polling`] pauses state reads for one connected controller.
//! A paused controller still reports connect and disconnect; its button state is
//! frozen until polling resumes, at which point the next sample is diffed against
//! the last one read. The switch is dropped with the controller on disconnect.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::device::{DeviceId, DeviceQuery};
use crate::error::{Error, Result};
use crate::event::{ControllerListener, EngineStatusListener};
use crate::eventbus::{panic_message, Dispatcher};
use crate::registry::{Reconciliation, Registry};
use crate::snapshot::Snapshot;

/// State shared between the polling thread and handles.
#[derive(Default)]
struct Shared {
    running: AtomicBool,
    dispatcher: Dispatcher,
    published: RwLock<Snapshot>,
    paused: RwLock<BTreeSet<DeviceId>>,
}

/// Cloneable, thread-safe control surface of an engine.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Request the loop to exit at the next tick boundary. Does not block.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            debug!("stop requested");
        }
    }

    /// No-op. Starting again goes through [`Engine::start`] or [`Engine::run`].
    pub fn reopen(&self) {
        debug!("reopen requested, ignored");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn add_engine_status_listener(&self, listener: Arc<dyn EngineStatusListener>) -> &Self {
        self.shared.dispatcher.add_status_listener(listener);
        self
    }

    pub fn add_controller_listener(&self, listener: Arc<dyn ControllerListener>) -> &Self {
        self.shared.dispatcher.add_controller_listener(listener);
        self
    }

    /// Controllers connected as of the last completed tick.
    pub fn controllers(&self) -> Snapshot {
        self.shared.published.read().clone()
    }

    /// Pause or resume state polling for a connected controller.
    ///
    /// Takes effect from the next tick. Returns `false` and changes nothing when
    /// `id` is not in the current [`controllers`](Self::controllers) snapshot.
    pub fn set_polling(&self, id: DeviceId, enabled: bool) -> bool {
        if self.shared.published.read().get(id).is_none() {
            return false;
        }
        let mut paused = self.shared.paused.write();
        if enabled {
            paused.remove(&id);
        } else {
            paused.insert(id);
        }
        debug!(id, enabled, "controller polling switched");
        true
    }

    /// Whether state reads are enabled for `id`. Controllers poll by default.
    pub fn is_polling(&self, id: DeviceId) -> bool {
        !self.shared.paused.read().contains(&id)
    }
}

pub struct Engine<Q: DeviceQuery> {
    port: Q,
    config: EngineConfig,
    registry: Registry,
    shared: Arc<Shared>,
    /// Enumerate on the next tick even if the port's dirty flag is clear.
    force_refresh: bool,
}

impl<Q: DeviceQuery> Engine<Q> {
    pub fn new(port: Q, config: EngineConfig) -> Self {
        Self {
            port,
            config,
            registry: Registry::new(),
            shared: Arc::new(Shared::default()),
            force_refresh: true,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
        }
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Controllers tracked by the polling thread. Empty before the first tick and
    /// after the engine closed.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn port(&self) -> &Q {
        &self.port
    }

    /// Mutable access to the port while the engine is not running.
    ///
    /// Only reachable between [`run`](Self::run) calls or after
    /// [`RunningEngine::join`], never during a tick. The port must still honour the
    /// [`DeviceQuery`] contract for ids the registry tracks: an id it drops has to
    /// be left out of the next enumeration.
    pub fn port_mut(&mut self) -> &mut Q {
        &mut self.port
    }

    /// Give the port back, dropping the engine.
    pub fn into_port(self) -> Q {
        self.port
    }

    /// Run the engine on the calling thread until [`EngineHandle::stop`].
    pub fn run(&mut self) -> Result<()> {
        self.begin()?;
        self.initialize()?;
        self.serve();
        Ok(())
    }

    /// Run one tick without sleeping.
    ///
    /// The caller is responsible for having initialized the port. Errors are logged,
    /// never returned: a bad tick only degrades that tick.
    pub fn poll_once(&mut self) {
        let mut changed = false;

        let refresh = std::mem::take(&mut self.force_refresh) || self.port.has_device_list_changed();
        if refresh {
            match self.port.list_device_ids() {
                Ok(ids) => {
                    let rec = self.registry.reconcile(&ids, &mut self.port, &self.config);
                    changed |= !rec.is_empty();
                    self.notify(rec);
                }
                Err(e) => {
                    warn!(error = %e, "device list refresh failed, retrying next tick");
                    self.force_refresh = true;
                }
            }
        }

        let mask = self.config.buttons.mask();
        let paused = self.shared.paused.read().clone();
        for id in self.registry.ids() {
            if paused.contains(&id) {
                continue;
            }
            let raw = match self.port.device_state(id) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(id, error = %e, "state read failed, keeping previous state");
                    continue;
                }
            };
            let Some(edges) = self.registry.apply_state(id, raw & mask) else {
                continue;
            };
            if edges.is_empty() {
                continue;
            }
            changed = true;
            if let Some(controller) = self.registry.get(id) {
                self.shared
                    .dispatcher
                    .edges(controller, edges, &self.config.buttons);
            }
        }

        if changed {
            self.publish();
        }
    }

    fn begin(&self) -> Result<()> {
        self.shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::AlreadyRunning)
    }

    fn initialize(&mut self) -> Result<()> {
        if let Err(e) = self.port.initialize() {
            self.shared.running.store(false, Ordering::Release);
            error!(error = %e, "device layer initialization failed");
            return Err(match e {
                Error::Initialization(_) => e,
                other => Error::Initialization(other.to_string()),
            });
        }
        self.force_refresh = true;
        Ok(())
    }

    fn serve(&mut self) {
        let period = self.config.tick_period();
        info!(tick_ms = period.as_millis() as u64, "controller engine started");
        self.shared.dispatcher.started();

        while self.shared.running.load(Ordering::Acquire) {
            let began = Instant::now();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.poll_once())) {
                error!(reason = panic_message(&*payload), "tick aborted");
                self.force_refresh = true;
            }
            if let Some(rest) = period.checked_sub(began.elapsed()) {
                thread::sleep(rest);
            }
        }

        self.port.terminate();
        self.registry = Registry::new();
        self.shared.paused.write().clear();
        self.publish();
        info!("controller engine closed");
        self.shared.dispatcher.closed();
    }

    fn notify(&self, rec: Reconciliation) {
        let dispatcher = &self.shared.dispatcher;
        if !rec.is_empty() {
            let mut paused = self.shared.paused.write();
            for controller in &rec.disconnected {
                paused.remove(&controller.id);
            }
            for id in &rec.connected {
                paused.remove(id);
            }
        }
        for controller in &rec.disconnected {
            info!(id = controller.id, name = %controller.name, "controller disconnected");
            dispatcher.disconnected(controller);
        }
        for id in rec.connected {
            if let Some(controller) = self.registry.get(id) {
                info!(id, guid = %controller.guid, name = %controller.name, "controller connected");
                dispatcher.connected(controller);
            }
        }
    }

    fn publish(&self) {
        *self.shared.published.write() = Snapshot(self.registry.iter().cloned().collect());
    }
}

impl<Q: DeviceQuery + 'static> Engine<Q> {
    /// Spawn the polling thread and wait for the port to initialize on it.
    pub fn start(mut self) -> Result<RunningEngine<Q>> {
        self.begin()?;
        let handle = self.handle();
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<()>>(1);

        let spawned = thread::Builder::new()
            .name("padwatch-poll".into())
            .spawn(move || {
                let init = self.initialize();
                let ok = init.is_ok();
                let _ = init_tx.send(init);
                if ok {
                    self.serve();
                }
                self
            });
        let thread = match spawned {
            Ok(t) => t,
            Err(e) => {
                handle.shared.running.store(false, Ordering::Release);
                return Err(Error::PollThread(e.to_string()));
            }
        };

        match init_rx.recv() {
            Ok(Ok(())) => Ok(RunningEngine { handle, thread }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                handle.shared.running.store(false, Ordering::Release);
                let reason = match thread.join() {
                    Err(payload) => panic_message(&*payload).to_string(),
                    Ok(_) => "initialization result lost".to_string(),
                };
                Err(Error::PollThread(reason))
            }
        }
    }
}

/// An engine whose polling thread is live.
pub struct RunningEngine<Q: DeviceQuery> {
    handle: EngineHandle,
    thread: JoinHandle<Engine<Q>>,
}

impl<Q: DeviceQuery> RunningEngine<Q> {
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Wait for the polling thread to finish and get the engine back.
    pub fn join(self) -> Result<Engine<Q>> {
        self.thread
            .join()
            .map_err(|payload| Error::PollThread(panic_message(&*payload).to_string()))
    }

    /// [`stop`](Self::stop) then [`join`](Self::join).
    pub fn shutdown(self) -> Result<Engine<Q>> {
        self.stop();
        self.join()
    }
}
