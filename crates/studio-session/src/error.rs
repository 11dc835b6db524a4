//! Session error types.

use studio_relay::{ReadyState, RelayError};
use thiserror::Error;

/// Errors from starting a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The shared connection is not open; nothing was changed.
    #[error("Connection not ready (state: {state:?})")]
    ConnectionNotReady { state: ReadyState },

    /// A generation is already running.
    #[error("A design session is already in progress")]
    Busy,

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

pub type SessionResult<T> = Result<T, SessionError>;
