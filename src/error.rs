//! Error types for the sync engine.

use thiserror::Error;

/// Main error type for tracking, event and delta-token operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown tracking source: {0}")]
    UnknownSource(String),

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Event delivery failed for {event}: {reason}")]
    EventDelivery { event: &'static str, reason: String },

    #[error("Batch already completed: {0}")]
    BatchCompleted(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        SyncError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
