//! The shared bucket store.

use std::sync::Arc;

use parking_lot::RwLock;
use studio_protocol::{
    group_by_section, ArtifactEntry, Classification, LogEntry, StateDelta, StateSnapshot,
};
use tokio::sync::watch;
use tracing::trace;

use crate::bucket::{Artifacts, Bucket, BucketKey, Cells, Logs, Prompt, State};

struct Inner {
    cells: RwLock<Cells>,
    revisions: [watch::Sender<u64>; 4],
}

/// Shared handle to the four buckets. Cloning is cheap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("cells", &*self.inner.cells.read())
            .finish()
    }
}

impl Store {
    /// Empty buckets and an empty prompt.
    pub fn new() -> Self {
        Self::with_cells(Cells::default())
    }

    /// Empty buckets with the prompt seeded.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self::with_cells(Cells {
            prompt: Arc::new(prompt.into()),
            ..Default::default()
        })
    }

    fn with_cells(cells: Cells) -> Self {
        Self {
            inner: Arc::new(Inner {
                cells: RwLock::new(cells),
                revisions: std::array::from_fn(|_| watch::channel(0).0),
            }),
        }
    }

    /// Immutable snapshot of a bucket.
    pub fn get<K: BucketKey>(&self) -> Arc<K::Value> {
        K::cell(&self.inner.cells.read()).clone()
    }

    pub fn set<K: BucketKey>(&self, value: K::Value) {
        self.transaction(|txn| txn.set::<K>(value));
    }

    /// Replace a bucket with a value computed from its previous one.
    ///
    /// `f` runs under the store's write lock, which is not reentrant. It must
    /// not call back into this store (`get`, `set`, another `update`, ...) or
    /// it deadlocks. Read other buckets through [`Store::transaction`] and
    /// [`Transaction::get`] instead.
    pub fn update<K, F>(&self, f: F)
    where
        K: BucketKey,
        F: FnOnce(&K::Value) -> K::Value,
    {
        self.transaction(|txn| txn.update::<K, F>(f));
    }

    /// Reset the named buckets to empty in one write.
    pub fn reset(&self, buckets: &[Bucket]) {
        self.transaction(|txn| txn.reset(buckets));
    }

    /// Run several writes under one lock. Subscribers of every touched
    /// bucket are notified once the lock is released.
    ///
    /// The lock is held while `f` runs and is not reentrant, so `f` must use
    /// only the [`Transaction`] it is given. Calling any `Store` method from
    /// inside `f` deadlocks.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let (result, dirty) = {
            let mut cells = self.inner.cells.write();
            let mut txn = Transaction {
                cells: &mut cells,
                dirty: [false; 4],
            };
            let result = f(&mut txn);
            (result, txn.dirty)
        };

        for bucket in Bucket::ALL {
            if dirty[bucket.index()] {
                self.inner.revisions[bucket.index()].send_modify(|rev| *rev += 1);
                trace!(%bucket, "Bucket changed");
            }
        }
        result
    }

    /// Number of writes a bucket has seen.
    pub fn revision(&self, bucket: Bucket) -> u64 {
        *self.inner.revisions[bucket.index()].borrow()
    }

    /// Change notifications for one bucket.
    pub fn subscribe(&self, bucket: Bucket) -> StoreSubscription {
        StoreSubscription {
            bucket,
            receiver: self.inner.revisions[bucket.index()].subscribe(),
        }
    }

    pub fn append_log(&self, entry: LogEntry) {
        self.transaction(|txn| txn.append_log(entry));
    }

    pub fn push_artifact(&self, artifact: ArtifactEntry) {
        self.transaction(|txn| txn.push_artifact(artifact));
    }

    pub fn merge_state(&self, delta: StateDelta) {
        self.transaction(|txn| txn.merge_state(delta));
    }

    /// Apply one classified frame to its bucket.
    pub fn apply(&self, classification: Classification) {
        self.transaction(|txn| match classification {
            Classification::Log(entry) => txn.append_log(entry),
            Classification::State(delta) => txn.merge_state(delta),
            Classification::Artifact(artifact) => txn.push_artifact(artifact),
        });
    }

    pub fn prompt(&self) -> Arc<String> {
        self.get::<Prompt>()
    }

    pub fn logs(&self) -> Arc<Vec<LogEntry>> {
        self.get::<Logs>()
    }

    pub fn state(&self) -> Arc<StateSnapshot> {
        self.get::<State>()
    }

    pub fn artifacts(&self) -> Arc<Vec<ArtifactEntry>> {
        self.get::<Artifacts>()
    }

    /// Artifacts grouped by section, sections in order of first use.
    pub fn artifact_sections(&self) -> Vec<ArtifactGroup> {
        let artifacts = self.artifacts();
        group_by_section(&artifacts)
            .into_iter()
            .map(|section| ArtifactGroup {
                name: section.name.to_string(),
                items: section.items.into_iter().cloned().collect(),
            })
            .collect()
    }
}

/// Owned artifact section, detached from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactGroup {
    pub name: String,
    pub items: Vec<ArtifactEntry>,
}

/// Write access to every bucket while the store lock is held.
pub struct Transaction<'a> {
    cells: &'a mut Cells,
    dirty: [bool; 4],
}

impl Transaction<'_> {
    fn touch(&mut self, bucket: Bucket) {
        self.dirty[bucket.index()] = true;
    }

    /// Value as written so far in this transaction.
    pub fn get<K: BucketKey>(&self) -> Arc<K::Value> {
        K::cell(self.cells).clone()
    }

    pub fn set<K: BucketKey>(&mut self, value: K::Value) {
        *K::cell_mut(self.cells) = Arc::new(value);
        self.touch(K::BUCKET);
    }

    pub fn update<K, F>(&mut self, f: F)
    where
        K: BucketKey,
        F: FnOnce(&K::Value) -> K::Value,
    {
        let next = f(K::cell(self.cells).as_ref());
        self.set::<K>(next);
    }

    pub fn reset(&mut self, buckets: &[Bucket]) {
        for &bucket in buckets {
            self.cells.reset(bucket);
            self.touch(bucket);
        }
    }

    pub fn append_log(&mut self, entry: LogEntry) {
        Arc::make_mut(&mut self.cells.logs).push(entry);
        self.touch(Bucket::Logs);
    }

    pub fn push_artifact(&mut self, artifact: ArtifactEntry) {
        Arc::make_mut(&mut self.cells.artifacts).push(artifact);
        self.touch(Bucket::Artifacts);
    }

    pub fn merge_state(&mut self, delta: StateDelta) {
        delta.merge_into(Arc::make_mut(&mut self.cells.state));
        self.touch(Bucket::State);
    }
}

/// Notifications for one bucket. Each change bumps the revision.
pub struct StoreSubscription {
    bucket: Bucket,
    receiver: watch::Receiver<u64>,
}

impl StoreSubscription {
    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    /// Latest revision, marking it seen.
    pub fn revision(&mut self) -> u64 {
        *self.receiver.borrow_and_update()
    }

    /// Wait for the next change and return its revision. Several writes
    /// between two calls coalesce into one wakeup. `None` once the store is
    /// gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// Whether a change arrived since the revision was last seen.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }
}
