//! Protocol error types.

use thiserror::Error;

/// Protocol error type.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON or does not have the `{event, data}` shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame parsed but its payload does not fit its event kind
    #[error("Malformed {event} frame: {reason}")]
    MalformedFrame { event: String, reason: String },

    /// Inline artifact content is not valid base64
    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl ProtocolError {
    pub(crate) fn malformed(event: &str, reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using ProtocolError.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
