//! Bridge configuration, read from a TOML file.
//!
//! ```toml
//! data_dir = "./data"
//!
//! [auth]
//! username = "bridge@example.com"
//! password = "hunter2"
//! ```

use crate::registry::DEFAULT_STORE_FILE;
use crate::session::Credentials;
use serde::Deserialize;
use skyrelay_core::{RelayError, RelayResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `auth.username`.
pub const ENV_USERNAME: &str = "SKYRELAY_USERNAME";
/// Environment variable overriding `auth.password`.
pub const ENV_PASSWORD: &str = "SKYRELAY_PASSWORD";

/// Remote-service credentials (`[auth]`).
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Remote account name.
    #[serde(default)]
    pub username: Option<String>,
    /// Remote account password.
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Bridge settings, read from `skyrelay.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Login credentials.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Directory for bridge state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Relay store location; defaults to a file inside `data_dir`.
    #[serde(default)]
    pub relays_path: Option<PathBuf>,
    /// Pause of the poll loop after a failed iteration.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_retry_backoff_secs() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            data_dir: default_data_dir(),
            relays_path: None,
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

impl BridgeConfig {
    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!(
                "Failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            RelayError::Config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Overrides credentials from `SKYRELAY_USERNAME` / `SKYRELAY_PASSWORD`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overrides credentials from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = lookup(ENV_USERNAME).filter(|v| !v.is_empty()) {
            self.auth.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.auth.password = Some(password);
        }
    }

    /// Relay store location, resolved against `data_dir`.
    pub fn relays_path(&self) -> PathBuf {
        self.relays_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_STORE_FILE))
    }

    /// Credentials for the session manager.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.auth.username.clone(),
            password: self.auth.password.clone(),
        }
    }

    /// [`retry_backoff_secs`](Self::retry_backoff_secs) as a duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}
