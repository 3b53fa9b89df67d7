//! Configuration store error types.

use thiserror::Error;

/// Errors surfaced by the config store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A required field was missing or failed a validation rule.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The value stored under a key could not be decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing key/value store failed.
    #[error("storage error: {0}")]
    Storage(#[from] chatos_storage::StorageError),

    /// Writing the effective marketplace manifest to disk failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for config store operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
