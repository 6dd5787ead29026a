//! Error types for the handbook core.

use thiserror::Error;

/// Main error type for handbook operations.
#[derive(Debug, Error)]
pub enum HandbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("Change dispatcher is not running")]
    DispatcherClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Producer(#[from] ProducerError),
}

impl From<serde_json::Error> for HandbookError {
    fn from(e: serde_json::Error) -> Self {
        HandbookError::Serialization(e.to_string())
    }
}

/// A failure reported by the external store in place of a change.
///
/// Producer errors go to the armed receiver of the affected channel and are
/// never buffered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProducerError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Listener cancelled: {0}")]
    Cancelled(String),
}

/// Result type for handbook operations.
pub type Result<T> = std::result::Result<T, HandbookError>;
