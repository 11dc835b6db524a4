//! Relay error types.

use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Send attempted while the connection is not open
    #[error("Not connected to backend")]
    NotConnected,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writer task is gone
    #[error("Failed to send message: {0}")]
    Send(String),
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;
