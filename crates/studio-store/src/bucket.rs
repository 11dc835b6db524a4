//! Bucket identities and their typed keys.

use std::fmt;
use std::sync::Arc;

use studio_protocol::{ArtifactEntry, LogEntry, StateSnapshot};

/// Names one of the four buckets at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Prompt,
    Logs,
    State,
    Artifacts,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Prompt, Bucket::Logs, Bucket::State, Bucket::Artifacts];

    /// Buckets cleared when a new generation starts.
    pub const SESSION_OUTPUT: [Bucket; 3] = [Bucket::Logs, Bucket::State, Bucket::Artifacts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Prompt => "prompt",
            Bucket::Logs => "logs",
            Bucket::State => "state",
            Bucket::Artifacts => "artifacts",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Bucket::Prompt => 0,
            Bucket::Logs => 1,
            Bucket::State => 2,
            Bucket::Artifacts => 3,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current value of every bucket.
#[derive(Debug, Default)]
pub struct Cells {
    pub(crate) prompt: Arc<String>,
    pub(crate) logs: Arc<Vec<LogEntry>>,
    pub(crate) state: Arc<StateSnapshot>,
    pub(crate) artifacts: Arc<Vec<ArtifactEntry>>,
}

impl Cells {
    pub(crate) fn reset(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Prompt => self.prompt = Arc::default(),
            Bucket::Logs => self.logs = Arc::default(),
            Bucket::State => self.state = Arc::default(),
            Bucket::Artifacts => self.artifacts = Arc::default(),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time key for a bucket. The value type of each bucket is fixed,
/// so a bucket can never be written with a different shape.
pub trait BucketKey: sealed::Sealed + 'static {
    type Value: Clone + Default + Send + Sync + 'static;

    const BUCKET: Bucket;

    #[doc(hidden)]
    fn cell(cells: &Cells) -> &Arc<Self::Value>;

    #[doc(hidden)]
    fn cell_mut(cells: &mut Cells) -> &mut Arc<Self::Value>;
}

macro_rules! bucket_key {
    ($(#[$meta:meta])* $key:ident, $field:ident, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $key;

        impl sealed::Sealed for $key {}

        impl BucketKey for $key {
            type Value = $value;

            const BUCKET: Bucket = Bucket::$key;

            fn cell(cells: &Cells) -> &Arc<Self::Value> {
                &cells.$field
            }

            fn cell_mut(cells: &mut Cells) -> &mut Arc<Self::Value> {
                &mut cells.$field
            }
        }
    };
}

bucket_key!(
    /// The prompt of the current session.
    Prompt, prompt, String
);
bucket_key!(
    /// Agent log entries in arrival order.
    Logs, logs, Vec<LogEntry>
);
bucket_key!(
    /// Latest state snapshot.
    State, state, StateSnapshot
);
bucket_key!(
    /// Generated artifacts in arrival order.
    Artifacts, artifacts, Vec<ArtifactEntry>
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_distinct() {
        let mut seen: Vec<usize> = Bucket::ALL.iter().map(|b| b.index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn keys_name_their_bucket() {
        assert_eq!(Prompt::BUCKET, Bucket::Prompt);
        assert_eq!(Logs::BUCKET, Bucket::Logs);
        assert_eq!(State::BUCKET, Bucket::State);
        assert_eq!(Artifacts::BUCKET, Bucket::Artifacts);
        assert_eq!(Bucket::Artifacts.to_string(), "artifacts");
    }

    #[test]
    fn reset_empties_one_cell() {
        let mut cells = Cells {
            prompt: Arc::new("dress".to_string()),
            ..Default::default()
        };
        cells.reset(Bucket::Logs);
        assert_eq!(cells.prompt.as_str(), "dress");
        cells.reset(Bucket::Prompt);
        assert!(cells.prompt.is_empty());
    }
}
