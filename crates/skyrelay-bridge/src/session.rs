//! Remote session lifecycle.
//!
//! The manager owns the "current" session. It is created lazily on first
//! use and replaced on [`SessionManager::renew`], which the poll loop calls
//! once the session is older than [`SESSION_RENEWAL_INTERVAL`]: long-lived
//! sessions stop receiving events on the remote side.

use crate::remote::{RemoteClient, RemoteSession};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use skyrelay_core::{RelayError, RelayResult, RemoteEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Age after which the poll loop replaces the session.
pub const SESSION_RENEWAL_INTERVAL: Duration = Duration::from_secs(3600);

/// Remote-service login credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: Option<String>,
    /// Account password.
    pub password: Option<String>,
}

impl Credentials {
    /// Credentials with both values set.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Both values, if both are present and non-empty.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A logged-in session plus the bookkeeping the bridge needs about it.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<dyn RemoteSession>,
    generation: u64,
    established: Instant,
    established_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Remote user id of the bridge account (used for echo suppression).
    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    /// Monotonic login counter; a renewed session has a higher generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall-clock time of the login.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Time since the login.
    pub fn age(&self) -> Duration {
        self.established.elapsed()
    }

    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("user_id", &self.user_id())
            .field("generation", &self.generation)
            .field("established_at", &self.established_at)
            .finish()
    }
}

/// Owns the current remote session.
pub struct SessionManager {
    client: Arc<dyn RemoteClient>,
    credentials: RwLock<Credentials>,
    current: Mutex<Option<SessionHandle>>,
    generation: AtomicU64,
    renewal_interval: Duration,
}

impl SessionManager {
    pub fn new(client: Arc<dyn RemoteClient>, credentials: Credentials) -> Self {
        Self::with_renewal_interval(client, credentials, SESSION_RENEWAL_INTERVAL)
    }

    /// Like [`new`](Self::new) with a custom renewal age.
    pub fn with_renewal_interval(
        client: Arc<dyn RemoteClient>,
        credentials: Credentials,
        renewal_interval: Duration,
    ) -> Self {
        Self {
            client,
            credentials: RwLock::new(credentials),
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            renewal_interval,
        }
    }

    /// Returns the current session, logging in first if there is none.
    ///
    /// Fails with [`RelayError::Config`] when credentials are missing and
    /// with [`RelayError::Authentication`] when the login is rejected.
    pub async fn get_session(&self) -> RelayResult<SessionHandle> {
        let mut current = self.current.lock().await;
        if let Some(handle) = current.as_ref() {
            return Ok(handle.clone());
        }
        let handle = self.login().await?;
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Whether `handle` is old enough to be replaced.
    pub fn renewal_due(&self, handle: &SessionHandle) -> bool {
        handle.age() >= self.renewal_interval
    }

    /// Replaces `stale` with a brand-new session.
    ///
    /// The stale session is dropped from the manager but left open: the
    /// caller still does one last pull on it. The new session starts a
    /// background pull whose events are discarded, so its backlog from the
    /// cut-over window is not delivered a second time later. Events that
    /// arrive between the login and the caller's last pull may still show up
    /// on both sessions.
    ///
    /// If `stale` is no longer current (reset or renewed elsewhere), the
    /// current session is returned unchanged.
    pub async fn renew(&self, stale: &SessionHandle) -> RelayResult<SessionHandle> {
        let mut current = self.current.lock().await;
        if let Some(handle) = current.as_ref() {
            if handle.generation != stale.generation {
                return Ok(handle.clone());
            }
        }

        current.take();
        let fresh = self.login().await?;
        *current = Some(fresh.clone());
        drop(current);

        info!(
            old_generation = stale.generation,
            generation = fresh.generation,
            "Remote session renewed"
        );

        let drain = fresh.clone();
        tokio::spawn(async move {
            match drain.session.pull_events().await {
                Ok(events) => debug!(count = events.len(), "Discarded events of renewed session"),
                Err(e) => warn!(error = %e, "Initial pull on renewed session failed"),
            }
        });

        Ok(fresh)
    }

    /// Drops the current session; the next [`get_session`](Self::get_session)
    /// logs in again.
    pub async fn reset(&self) {
        if let Some(old) = self.current.lock().await.take() {
            info!(generation = old.generation, "Remote session reset");
        }
    }

    /// Swaps the credentials and drops the session logged in with the old ones.
    pub async fn update_credentials(&self, credentials: Credentials) {
        let changed = {
            let mut current = self.credentials.write();
            let changed = *current != credentials;
            *current = credentials;
            changed
        };
        if changed {
            self.reset().await;
        }
    }

    /// Blocks until the next batch of events of `handle`.
    pub async fn pull_events(&self, handle: &SessionHandle) -> RelayResult<Vec<RemoteEvent>> {
        handle.session.pull_events().await
    }

    /// Sends markup to a room, reporting any failure as
    /// [`RelayError::Delivery`].
    pub async fn send_message(
        &self,
        handle: &SessionHandle,
        room_id: &str,
        content: &str,
    ) -> RelayResult<()> {
        match handle.session.send_message(room_id, content).await {
            Ok(()) => Ok(()),
            Err(e @ RelayError::Delivery(_)) => Err(e),
            Err(e) => Err(RelayError::Delivery(e.to_string())),
        }
    }

    async fn login(&self) -> RelayResult<SessionHandle> {
        let (username, password) = {
            let credentials = self.credentials.read();
            match credentials.pair() {
                Some((u, p)) => (u.to_string(), p.to_string()),
                None => {
                    return Err(RelayError::Config(
                        "Missing remote username and/or password. Configure them in \
                         [auth] username / password."
                            .to_string(),
                    ))
                }
            }
        };

        let session = match self.client.login(&username, &password).await {
            Ok(session) => session,
            Err(e) => {
                warn!(username = %username, error = %e, "Remote login failed");
                return Err(match e {
                    RelayError::Authentication(_) | RelayError::Config(_) => e,
                    other => RelayError::Authentication(other.to_string()),
                });
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            username = %username,
            user_id = %session.user_id(),
            generation,
            "Remote session established"
        );
        Ok(SessionHandle {
            session,
            generation,
            established: Instant::now(),
            established_at: Utc::now(),
        })
    }
}
