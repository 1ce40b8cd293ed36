//! The bridge instance and its background poll loop.

use crate::commands::RelayCommands;
use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::forwarder::Forwarder;
use crate::local::LocalNetwork;
use crate::registry::{FileRelayStore, RelayRegistry};
use crate::remote::RemoteClient;
use crate::session::SessionManager;
use crate::transcode::Transcoder;
use parking_lot::{Mutex, RwLock};
use skyrelay_core::{LocalMessage, RelayError, RelayResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Process-level registration of the bridge instance currently in charge.
///
/// A poll loop keeps running only while its bridge is the registered one,
/// so a loop left behind by a torn-down instance exits on its own.
#[derive(Clone, Default)]
pub struct InstanceSlot {
    current: Arc<RwLock<Option<Uuid>>>,
}

impl InstanceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`, replacing any previous instance.
    pub fn claim(&self, id: Uuid) {
        *self.current.write() = Some(id);
    }

    /// Unregisters `id` if it is still the current instance.
    pub fn release(&self, id: Uuid) {
        let mut current = self.current.write();
        if *current == Some(id) {
            *current = None;
        }
    }

    /// Whether `id` is the registered instance.
    pub fn is_current(&self, id: Uuid) -> bool {
        *self.current.read() == Some(id)
    }

    pub fn current(&self) -> Option<Uuid> {
        *self.current.read()
    }
}

struct BridgeInner {
    id: Uuid,
    slot: InstanceSlot,
    registry: Arc<RelayRegistry>,
    sessions: Arc<SessionManager>,
    dispatcher: Dispatcher,
    forwarder: Forwarder,
    retry_backoff: Duration,
    stop: AtomicBool,
    running: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeInner {
    fn should_run(&self) -> bool {
        !self.stop.load(Ordering::Acquire) && self.slot.is_current(self.id)
    }

    async fn poll_once(&self) -> RelayResult<usize> {
        let session = self.sessions.get_session().await?;

        if self.sessions.renewal_due(&session) {
            // Later iterations poll the new session; this one still does a
            // last pull on the old one below.
            if let Err(e) = self.sessions.renew(&session).await {
                warn!(error = %e, "Session renewal failed");
            }
        }

        let events = self.sessions.pull_events(&session).await?;
        if !self.should_run() {
            debug!(count = events.len(), "Bridge stopped, dropping pulled events");
            return Ok(0);
        }

        let mut delivered = 0;
        for event in &events {
            match self.dispatcher.dispatch(event, session.user_id()) {
                Ok(n) => delivered += n,
                Err(e) => warn!(kind = %event.kind(), error = %e, "Failed to dispatch remote event"),
            }
        }
        debug!(events = events.len(), delivered, "Remote events dispatched");
        Ok(delivered)
    }
}

/// Clears the running flag when the loop task ends, however it ends.
struct RunningGuard(Arc<BridgeInner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

async fn run_loop(inner: Arc<BridgeInner>) {
    let guard = RunningGuard(inner);
    let inner = &guard.0;
    info!(bridge = %inner.id, "Relay loop started");

    while inner.should_run() {
        if let Err(e) = inner.poll_once().await {
            warn!(bridge = %inner.id, error = %e, "Relay loop iteration failed");
            tokio::time::sleep(inner.retry_backoff).await;
        }
    }

    info!(bridge = %inner.id, "Relay loop stopped");
}

/// One bridge between the local network and the remote service.
///
/// Cloning is cheap; clones share the same state and loop.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Builds a bridge from configuration, storing relays in the configured
    /// file, and registers it as the current instance in `slot`.
    pub fn new(
        config: &BridgeConfig,
        client: Arc<dyn RemoteClient>,
        local: Arc<dyn LocalNetwork>,
        slot: InstanceSlot,
    ) -> Self {
        let store = FileRelayStore::new(config.relays_path());
        let registry =
            Arc::new(RelayRegistry::new(Arc::new(store)).with_local_network(local.clone()));
        let sessions = Arc::new(SessionManager::new(client, config.credentials()));
        Self::from_parts(registry, sessions, local, slot, config.retry_backoff())
    }

    /// Builds a bridge from already constructed parts.
    pub fn from_parts(
        registry: Arc<RelayRegistry>,
        sessions: Arc<SessionManager>,
        local: Arc<dyn LocalNetwork>,
        slot: InstanceSlot,
        retry_backoff: Duration,
    ) -> Self {
        let transcoder = Arc::new(Transcoder::new());
        let dispatcher = Dispatcher::new(registry.clone(), local.clone(), transcoder.clone());
        let forwarder = Forwarder::new(registry.clone(), sessions.clone(), local, transcoder);

        let id = Uuid::new_v4();
        slot.claim(id);
        Self {
            inner: Arc::new(BridgeInner {
                id,
                slot,
                registry,
                sessions,
                dispatcher,
                forwarder,
                retry_backoff,
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
                loop_handle: Mutex::new(None),
            }),
        }
    }

    /// Identity of this instance in its [`InstanceSlot`].
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn registry(&self) -> &Arc<RelayRegistry> {
        &self.inner.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.inner.sessions
    }

    /// Command handlers bound to this bridge.
    pub fn commands(&self) -> RelayCommands {
        RelayCommands::new(self.inner.registry.clone(), self.inner.sessions.clone())
    }

    /// Callback for every local message, notice and topic change.
    ///
    /// Starts the poll loop if it is not running, then forwards the message.
    /// Must be called from within a Tokio runtime.
    pub async fn on_local_message(&self, msg: LocalMessage) -> RelayResult<Vec<RelayError>> {
        self.ensure_loop_started();
        self.inner.forwarder.forward(&msg).await
    }

    /// Spawns the poll loop unless it is running or the bridge was shut
    /// down. Returns whether a loop was spawned.
    pub fn ensure_loop_started(&self) -> bool {
        // Cheap check first; only take the lock when a spawn looks needed.
        if !self.inner.should_run() || self.inner.running.load(Ordering::Acquire) {
            return false;
        }

        let mut handle = self.inner.loop_handle.lock();
        if !self.inner.should_run() {
            return false;
        }
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        self.inner.running.store(true, Ordering::Release);
        *handle = Some(tokio::spawn(run_loop(self.inner.clone())));
        true
    }

    /// Runs one pull-and-dispatch iteration on the calling task.
    pub async fn poll_once(&self) -> RelayResult<usize> {
        self.inner.poll_once().await
    }

    /// Whether the poll loop task is alive.
    pub fn is_loop_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Drops the remote session; the next poll or send logs in again.
    pub async fn reset_session(&self) {
        self.inner.sessions.reset().await;
    }

    /// Stops the poll loop at its next iteration and unregisters the
    /// instance. Idempotent.
    pub fn shutdown(&self) {
        if !self.inner.stop.swap(true, Ordering::AcqRel) {
            info!(bridge = %self.inner.id, "Bridge shutting down");
        }
        self.inner.slot.release(self.inner.id);
    }

    /// Waits for the poll loop task to finish, if one was spawned.
    pub async fn join_loop(&self) {
        let handle = self.inner.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Relay loop task failed");
            }
        }
    }
}
