//! Error types for the flatman core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the live query layer and the repository.
#[derive(Debug, Error)]
pub enum Error {
    /// Permission or connectivity failure on a subscription. Terminal for the
    /// stream that receives it; other open subscriptions are unaffected.
    #[error("listener error: {0}")]
    Listener(String),

    /// A push/set/remove rejected by the store. No retry, no queuing.
    #[error("write rejected at {path}: {message}")]
    Write { path: String, message: String },

    /// Missing id, failed validation, or an otherwise unusable argument.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a listener error
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }

    /// Create a write rejection error
    pub fn write(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
