use std::path::Path;

use ichnaea_history::VersionRecord;
use ichnaea_types::{ContentHash, DatasetPath};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::{Repository, SyncReport};

#[derive(Clone, Copy, Debug)]
struct Staged {
    hash: ContentHash,
    size: u64,
}

/// Exclusive handle on one dataset path.
///
/// Obtained from [`Repository::begin`]; the path's critical section is held
/// until the transaction is dropped. Stage content with [`put`](Self::put)
/// or [`put_file`](Self::put_file), then [`commit`](Self::commit) it.
pub struct PathTransaction<'r> {
    repo: &'r Repository,
    path: DatasetPath,
    staged: Option<Staged>,
    _guard: OwnedMutexGuard<()>,
}

impl<'r> PathTransaction<'r> {
    pub(crate) fn new(repo: &'r Repository, path: DatasetPath, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            repo,
            path,
            staged: None,
            _guard: guard,
        }
    }

    pub fn path(&self) -> &DatasetPath {
        &self.path
    }

    /// Content staged by the last `put`, if not yet committed.
    pub fn staged(&self) -> Option<ContentHash> {
        self.staged.map(|s| s.hash)
    }

    /// Store `data` and make it the path's working content.
    pub async fn put(&mut self, data: &[u8]) -> RepositoryResult<ContentHash> {
        let hash = self.repo.store_bytes(&self.path, data.to_vec()).await?;
        self.staged = Some(Staged {
            hash,
            size: data.len() as u64,
        });
        Ok(hash)
    }

    /// Store a file whose hash was computed while it was fetched.
    pub async fn put_file(&mut self, source: &Path, expected: &ContentHash) -> RepositoryResult<ContentHash> {
        let (hash, size) = self
            .repo
            .store_file(&self.path, source.to_path_buf(), *expected)
            .await?;
        self.staged = Some(Staged { hash, size });
        Ok(hash)
    }

    /// Append a version record for the staged content.
    ///
    /// Fails with [`RepositoryError::NoChanges`] if nothing is staged or the
    /// staged content equals the current head. Never retried internally.
    pub async fn commit(&mut self, message: &str) -> RepositoryResult<VersionRecord> {
        let Some(staged) = self.staged else {
            return Err(RepositoryError::NoChanges {
                path: self.path.clone(),
            });
        };
        let record = self
            .repo
            .append_record(&self.path, staged.hash, staged.size, message)
            .await?;
        self.staged = None;
        Ok(record)
    }

    /// Push this path's unsynced records while still holding the lock.
    pub async fn sync(&self, cancel: &CancellationToken) -> RepositoryResult<SyncReport> {
        self.repo.sync_locked(&self.path, cancel).await
    }
}

impl std::fmt::Debug for PathTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathTransaction")
            .field("path", &self.path)
            .field("staged", &self.staged)
            .finish()
    }
}
