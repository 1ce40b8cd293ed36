use thiserror::Error;

/// A convenience `Result` alias using [`RelayError`].
pub type RelayResult<T> = Result<T, RelayError>;

/// Top-level error type for the bridge.
///
/// Each variant corresponds to one failure class the bridge distinguishes
/// when deciding whether to surface, log or skip.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or unreadable configuration (e.g. no remote credentials).
    #[error("Config error: {0}")]
    Config(String),

    /// The remote service rejected the login.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A message could not be delivered to one remote room.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Pulling events from the remote service failed.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A line of the relay store could not be parsed.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Input rejected by validation (e.g. a bad room id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The relay already exists.
    #[error("Duplicate relay: {0}")]
    Duplicate(String),

    /// The relay does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to run the command.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// I/O failure, e.g. reading or writing the relay store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error belongs to the synchronous validation class
    /// (bad room id, duplicate on add, missing on remove).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RelayError::Validation(_) | RelayError::Duplicate(_) | RelayError::NotFound(_)
        )
    }

    /// Whether this error prevented a remote session from being established.
    pub fn is_session_setup(&self) -> bool {
        matches!(self, RelayError::Config(_) | RelayError::Authentication(_))
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(e: toml::de::Error) -> Self {
        RelayError::Config(e.to_string())
    }
}
