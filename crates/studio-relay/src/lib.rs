//! WebSocket connection manager for the design studio backend.
//!
//! This crate provides:
//! - One physical connection shared by every subscriber
//! - Reference-counted subscriptions: the socket closes with the last one
//! - Automatic reconnection with exponential backoff
//! - Fail-fast sends while the connection is not open

mod client;
mod error;
mod hub;

pub use client::{ReadyState, RelayClient, RelayConfig, RelaySubscription};
pub use error::{RelayError, RelayResult};
