//! Error types for luk-agent.

use thiserror::Error;

/// Result type for luk-agent operations.
pub type Result<T> = std::result::Result<T, LukError>;

/// Error kinds and their recovery policy:
///
/// - `Configuration`: fatal, process exits nonzero.
/// - `NetworkTransient`: retried up to the login retry bound, or the
///   single datagram is dropped.
/// - `NetworkFatal`: logged and the process exits.
/// - `Protocol`: the offending message is dropped, session continues.
/// - `Command`: the offending command is dropped, session continues.
/// - `DatabaseCorrupt`: the load is abandoned, session continues with an
///   empty database.
/// - `Resource`: the in-progress import is aborted cleanly.
#[derive(Debug, Error)]
pub enum LukError {
    /// Missing required config key, unreadable config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Timeout during login, decode failure on a single datagram.
    #[error("transient network error: {0}")]
    NetworkTransient(String),

    /// Banned, invalid password, old protocol.
    #[error("fatal network error: {0}")]
    NetworkFatal(String),

    /// Bad capsule, bad prefix, bad query ID.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Missing arguments, non-alphabetic key.
    #[error("command error: {0}")]
    Command(String),

    /// Any database-file validation failure from the import codec.
    #[error("database file is corrupt: {0}")]
    DatabaseCorrupt(String),

    /// Allocation failure or size-budget overrun while importing a record.
    #[error("resource error: {0}")]
    Resource(String),

    /// Wraps std::io::Error for file and socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LukError {
    /// True for errors whose policy is "retry"
    pub fn is_retryable(&self) -> bool {
        matches!(self, LukError::NetworkTransient(_))
    }

    /// True for errors whose policy is "log and exit"
    pub fn is_fatal(&self) -> bool {
        matches!(self, LukError::Configuration(_) | LukError::NetworkFatal(_))
    }
}
