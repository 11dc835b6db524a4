//! Wire protocol for the design studio stream.
//!
//! This crate provides:
//! - Inbound frames (`{event, data}`) and the closed [`EventKind`] set
//! - The outbound `start_design` message
//! - Typed payload views for log, state and artifact events
//! - [`classify`], the pure routing function from a frame to a state bucket

mod artifact;
mod classify;
mod error;
mod messages;
mod state;

pub use artifact::{group_by_section, ArtifactEntry, ArtifactSection, MediaKind, MediaSource};
pub use classify::{classify, Classification};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    EventKind, FunctionCall, FunctionResponse, InboundMessage, LogEntry, LogPayload,
    OutboundMessage, TextResponse,
};
pub use state::{StateDelta, StateSnapshot};
