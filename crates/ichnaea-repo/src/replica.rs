use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ichnaea_history::{History, HistoryError, VersionRecord};
use ichnaea_store::{FsObjectStore, InMemoryObjectStore, ObjectStore, StoreError};
use ichnaea_types::{CommitId, ContentHash, DatasetPath};
use tracing::debug;

use crate::error::{ReplicaError, ReplicaResult};

/// Remote copy of a repository that local commits are pushed to.
///
/// Blobs are pushed before the records that reference them. A replica
/// verifies that every received record extends its own chain for that path
/// and rejects gaps, forks and tampered records.
#[async_trait]
pub trait Replica: Send + Sync {
    async fn push_objects(&self, blobs: Vec<(ContentHash, Vec<u8>)>) -> ReplicaResult<()>;

    /// Records are oldest first. Re-pushing already accepted records is a no-op.
    async fn push_records(&self, records: Vec<VersionRecord>) -> ReplicaResult<()>;

    async fn remote_head(&self, path: &DatasetPath) -> ReplicaResult<Option<CommitId>>;
}

fn accept_objects(
    store: &dyn ObjectStore,
    blobs: Vec<(ContentHash, Vec<u8>)>,
) -> ReplicaResult<usize> {
    let count = blobs.len();
    for (expected, data) in blobs {
        let computed = store.write(&data)?;
        if computed != expected {
            return Err(StoreError::HashMismatch { expected, computed }.into());
        }
    }
    Ok(count)
}

fn accept_records(
    store: &dyn ObjectStore,
    history: &History,
    records: Vec<VersionRecord>,
) -> ReplicaResult<usize> {
    let mut accepted = 0;
    for record in records {
        if !store.exists(&record.content_hash)? {
            return Err(ReplicaError::MissingObject(record.content_hash));
        }
        let commit = record.commit_id;
        match history.import(record) {
            Ok(true) => accepted += 1,
            Ok(false) => {}
            Err(e @ (HistoryError::Integrity { .. } | HistoryError::Conflict { .. })) => {
                return Err(ReplicaError::Rejected {
                    commit,
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(accepted)
}

/// Replica held in memory, for tests and embedding.
///
/// Can be switched offline to exercise sync failure handling.
pub struct InMemoryReplica {
    store: InMemoryObjectStore,
    history: History,
    online: AtomicBool,
}

impl InMemoryReplica {
    pub fn new() -> Self {
        Self {
            store: InMemoryObjectStore::new(),
            history: History::in_memory(),
            online: AtomicBool::new(true),
        }
    }

    /// While offline every push fails with [`ReplicaError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn store(&self) -> &InMemoryObjectStore {
        &self.store
    }

    fn check_online(&self) -> ReplicaResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ReplicaError::Unavailable("replica offline".into()))
        }
    }
}

impl Default for InMemoryReplica {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Replica for InMemoryReplica {
    async fn push_objects(&self, blobs: Vec<(ContentHash, Vec<u8>)>) -> ReplicaResult<()> {
        self.check_online()?;
        accept_objects(&self.store, blobs)?;
        Ok(())
    }

    async fn push_records(&self, records: Vec<VersionRecord>) -> ReplicaResult<()> {
        self.check_online()?;
        accept_records(&self.store, &self.history, records)?;
        Ok(())
    }

    async fn remote_head(&self, path: &DatasetPath) -> ReplicaResult<Option<CommitId>> {
        self.check_online()?;
        Ok(self.history.head(path)?.map(|r| r.commit_id))
    }
}

/// Mirror in another directory, with its own object store and journal.
#[derive(Clone)]
pub struct DirectoryReplica {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    root: PathBuf,
    store: FsObjectStore,
    history: History,
}

impl DirectoryReplica {
    pub fn open(root: impl Into<PathBuf>) -> ReplicaResult<Self> {
        let root = root.into();
        let store = FsObjectStore::open(root.join("objects"))?;
        let history = History::open(&root.join("history.log"))?;
        Ok(Self {
            inner: Arc::new(DirectoryInner {
                root,
                store,
                history,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn history(&self) -> &History {
        &self.inner.history
    }

    async fn blocking<T, F>(&self, work: F) -> ReplicaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DirectoryInner) -> ReplicaResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || work(&inner))
            .await
            .map_err(|e| ReplicaError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Replica for DirectoryReplica {
    async fn push_objects(&self, blobs: Vec<(ContentHash, Vec<u8>)>) -> ReplicaResult<()> {
        let count = self
            .blocking(move |inner| accept_objects(&inner.store, blobs))
            .await?;
        debug!(replica = %self.root().display(), count, "objects received");
        Ok(())
    }

    async fn push_records(&self, records: Vec<VersionRecord>) -> ReplicaResult<()> {
        let accepted = self
            .blocking(move |inner| accept_records(&inner.store, &inner.history, records))
            .await?;
        debug!(replica = %self.root().display(), accepted, "records received");
        Ok(())
    }

    async fn remote_head(&self, path: &DatasetPath) -> ReplicaResult<Option<CommitId>> {
        Ok(self.inner.history.head(path)?.map(|r| r.commit_id))
    }
}

impl std::fmt::Debug for DirectoryReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryReplica")
            .field("root", &self.inner.root)
            .finish()
    }
}
