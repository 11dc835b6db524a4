//! # Studio Store
//!
//! Four long-lived state buckets fed by the ingestion loop and read by any
//! number of independent consumers.
//!
//! - [`Prompt`] - the prompt of the current session
//! - [`Logs`] - agent log entries in arrival order
//! - [`State`] - the latest state snapshot, merged key by key
//! - [`Artifacts`] - generated artifacts in arrival order
//!
//! Reads hand out immutable [`std::sync::Arc`] snapshots. Writes are short
//! critical sections; [`Store::transaction`] groups several of them so no
//! reader observes a half-applied reset.
//!
//! ```rust
//! use studio_store::{Bucket, Logs, Prompt, Store};
//!
//! let store = Store::with_prompt("a red dress");
//! store.transaction(|txn| {
//!     txn.reset(&[Bucket::Logs, Bucket::State, Bucket::Artifacts]);
//!     txn.set::<Prompt>("a blue coat".to_string());
//! });
//! assert_eq!(store.get::<Prompt>().as_str(), "a blue coat");
//! assert!(store.get::<Logs>().is_empty());
//! ```

mod bucket;
mod error;
mod prompt_cache;
mod store;

pub use bucket::{Artifacts, Bucket, BucketKey, Logs, Prompt, State};
pub use error::{StoreError, StoreResult};
pub use prompt_cache::{PromptCache, DEFAULT_PROMPT};
pub use store::{ArtifactGroup, Store, StoreSubscription, Transaction};
