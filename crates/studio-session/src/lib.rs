//! Session control for the design studio.
//!
//! [`SessionController`] starts generations and runs the ingestion loop that
//! folds relay frames into the [`studio_store::Store`] in delivery order.
//! Its busy flag is derived from the frames it ingests.

mod controller;
mod error;

pub use controller::{SessionController, SessionPhase};
pub use error::{SessionError, SessionResult};
