//! Durable relay registry.
//!
//! The registry keeps the full set of relays in memory, loaded from its
//! [`RelayStore`] on first access, and rewrites the store in full on every
//! mutation. A mutation only becomes visible in memory once the store write
//! succeeded, so the cache and the store never diverge.

use crate::local::LocalNetwork;
use parking_lot::{Mutex, RwLock};
use skyrelay_core::{Relay, RelayError, RelayResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the relay store inside the data directory.
pub const DEFAULT_STORE_FILE: &str = "SkypeRelay_relays.txt";

/// Durable backing store for relays.
pub trait RelayStore: Send + Sync {
    /// Reads every well-formed relay, skipping malformed records.
    fn load(&self) -> RelayResult<Vec<Relay>>;

    /// Replaces the stored set with `relays`.
    fn persist(&self, relays: &[Relay]) -> RelayResult<()>;
}

/// Line-oriented text store: one `network channel roomId` record per line.
pub struct FileRelayStore {
    path: PathBuf,
}

impl FileRelayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RelayStore for FileRelayStore {
    fn load(&self) -> RelayResult<Vec<Relay>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No relay store yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut relays = Vec::new();
        for (i, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Relay::from_record(line) {
                Ok(relay) => relays.push(relay),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = i + 1,
                    error = %e,
                    "Skipping invalid relay record"
                ),
            }
        }
        Ok(relays)
    }

    fn persist(&self, relays: &[Relay]) -> RelayResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        // Atomic write: temp file + rename
        let tmp_path = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            for relay in relays {
                writeln!(file, "{}", relay.to_record())?;
            }
            file.sync_all()?;
            std::fs::rename(&tmp_path, &self.path)
        };
        if let Err(e) = write() {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to write relay store");
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// In-memory store, for embedders that keep relays elsewhere.
#[derive(Default)]
pub struct MemoryRelayStore {
    relays: Mutex<Vec<Relay>>,
}

impl MemoryRelayStore {
    pub fn new(relays: Vec<Relay>) -> Self {
        Self {
            relays: Mutex::new(relays),
        }
    }
}

impl RelayStore for MemoryRelayStore {
    fn load(&self) -> RelayResult<Vec<Relay>> {
        Ok(self.relays.lock().clone())
    }

    fn persist(&self, relays: &[Relay]) -> RelayResult<()> {
        *self.relays.lock() = relays.to_vec();
        Ok(())
    }
}

/// The set of relays, lazily loaded and persisted on every change.
pub struct RelayRegistry {
    store: Arc<dyn RelayStore>,
    local: Option<Arc<dyn LocalNetwork>>,
    /// Loaded snapshot; `None` until first access.
    relays: RwLock<Option<Arc<Vec<Relay>>>>,
    /// Serializes first load and every read-modify-persist sequence.
    write_lock: Mutex<()>,
}

impl RelayRegistry {
    pub fn new(store: Arc<dyn RelayStore>) -> Self {
        Self {
            store,
            local: None,
            relays: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Checks loaded records against the local networks (warnings only).
    pub fn with_local_network(mut self, local: Arc<dyn LocalNetwork>) -> Self {
        self.local = Some(local);
        self
    }

    /// Loads the store if that has not happened yet and returns the current
    /// snapshot, in insertion order.
    pub fn list(&self) -> RelayResult<Arc<Vec<Relay>>> {
        if let Some(relays) = self.relays.read().as_ref() {
            return Ok(relays.clone());
        }
        let _guard = self.write_lock.lock();
        self.loaded()
    }

    /// Adds a relay, failing on an invalid room id or an existing identical relay.
    pub fn add(&self, relay: Relay) -> RelayResult<()> {
        relay.validate()?;
        let _guard = self.write_lock.lock();
        let current = self.loaded()?;
        if current.contains(&relay) {
            return Err(RelayError::Duplicate(relay.to_string()));
        }

        let mut next = current.to_vec();
        next.push(relay.clone());
        self.commit(next)?;
        tracing::info!(relay = %relay, "Relay added");
        Ok(())
    }

    /// Removes the relay matching all three fields.
    pub fn remove(&self, relay: &Relay) -> RelayResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.loaded()?;
        let Some(pos) = current.iter().position(|r| r == relay) else {
            return Err(RelayError::NotFound(relay.to_string()));
        };

        let mut next = current.to_vec();
        next.remove(pos);
        self.commit(next)?;
        tracing::info!(relay = %relay, "Relay removed");
        Ok(())
    }

    /// Whether an identical relay exists.
    pub fn contains(&self, relay: &Relay) -> RelayResult<bool> {
        Ok(self.list()?.contains(relay))
    }

    /// Relays bridging the given remote room.
    pub fn matching_room(&self, room_id: &str) -> RelayResult<Vec<Relay>> {
        Ok(self
            .list()?
            .iter()
            .filter(|r| r.remote_room_id == room_id)
            .cloned()
            .collect())
    }

    /// Relays bridging the given local channel.
    pub fn matching_channel(&self, network: &str, channel: &str) -> RelayResult<Vec<Relay>> {
        Ok(self
            .list()?
            .iter()
            .filter(|r| r.is_local(network, channel))
            .cloned()
            .collect())
    }

    /// Rewrites the store from the in-memory set.
    pub fn persist(&self) -> RelayResult<()> {
        let _guard = self.write_lock.lock();
        let current = self.loaded()?;
        self.store.persist(&current)
    }

    /// Must be called with `write_lock` held.
    fn loaded(&self) -> RelayResult<Arc<Vec<Relay>>> {
        if let Some(relays) = self.relays.read().as_ref() {
            return Ok(relays.clone());
        }

        let relays = self.store.load()?;
        if let Some(local) = &self.local {
            for relay in &relays {
                if !local.has_network(&relay.network) {
                    tracing::warn!(network = %relay.network, "Unknown network in relay store");
                } else if !local.is_channel(&relay.network, &relay.channel) {
                    tracing::warn!(channel = %relay.channel, "Invalid channel in relay store");
                }
            }
        }
        tracing::info!(count = relays.len(), "Relays loaded");

        let relays = Arc::new(relays);
        *self.relays.write() = Some(relays.clone());
        Ok(relays)
    }

    /// Persists `next` and swaps it in. Must be called with `write_lock` held.
    fn commit(&self, next: Vec<Relay>) -> RelayResult<()> {
        self.store.persist(&next)?;
        *self.relays.write() = Some(Arc::new(next));
        Ok(())
    }
}
