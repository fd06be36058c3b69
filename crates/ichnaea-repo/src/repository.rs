use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ichnaea_diff::{diff_blobs, BlobDiff, DEFAULT_CONTEXT};
use ichnaea_history::{History, HistoryError, RecordDraft, VersionRecord};
use ichnaea_store::{FsObjectStore, ObjectStore, StoreError};
use ichnaea_types::{CommitId, ContentHash, DatasetPath};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{
    ReplicaError, RepositoryError, RepositoryResult, ResolveError, ResolveResult,
};
use crate::locks::PathLocks;
use crate::replica::Replica;
use crate::transaction::PathTransaction;
use crate::worktree::Worktree;

/// Options for [`Repository::open`].
#[derive(Clone, Default)]
pub struct RepositoryOptions {
    /// Where [`Repository::sync`] pushes commits. Sync fails without one.
    pub replica: Option<Arc<dyn Replica>>,
}

/// Outcome of pushing a path's unsynced records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub path: DatasetPath,
    pub records_pushed: usize,
    pub objects_pushed: usize,
    pub head: Option<CommitId>,
}

/// Something wrong found by [`Repository::verify`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum VerifyProblem {
    Chain { detail: String },
    MissingBlob { commit: CommitId, hash: ContentHash },
    CorruptBlob { commit: CommitId, hash: ContentHash },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub path: DatasetPath,
    pub records_checked: usize,
    pub problems: Vec<VerifyProblem>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// On-disk versioned dataset storage.
pub struct Repository {
    root: PathBuf,
    store: Arc<dyn ObjectStore>,
    worktree: Worktree,
    history: Arc<History>,
    locks: PathLocks,
    replica: Option<Arc<dyn Replica>>,
}

impl Repository {
    /// Open (or initialize) the repository at `root`, recovering history
    /// from its journal.
    pub fn open(root: impl Into<PathBuf>, options: RepositoryOptions) -> RepositoryResult<Self> {
        let root = root.into();
        let store = FsObjectStore::open(root.join("objects"))?;
        let worktree = Worktree::open(root.join("worktree"))?;
        let history = History::open(&root.join("history.log"))?;
        info!(root = %root.display(), replica = options.replica.is_some(), "repository opened");
        Ok(Self {
            root,
            store: Arc::new(store),
            worktree,
            history: Arc::new(history),
            locks: PathLocks::new(),
            replica: options.replica,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn worktree(&self) -> &Worktree {
        &self.worktree
    }

    pub fn has_replica(&self) -> bool {
        self.replica.is_some()
    }

    // ---- Mutations ----

    /// Enter the critical section of `path`.
    pub async fn begin(&self, path: &DatasetPath) -> RepositoryResult<PathTransaction<'_>> {
        let guard = self.locks.acquire(path).await?;
        debug!(%path, "path lock acquired");
        Ok(PathTransaction::new(self, path.clone(), guard))
    }

    /// `begin` + `put` + `commit` in one call.
    pub async fn ingest_bytes(
        &self,
        path: &DatasetPath,
        data: &[u8],
        message: &str,
    ) -> RepositoryResult<VersionRecord> {
        let mut tx = self.begin(path).await?;
        tx.put(data).await?;
        tx.commit(message).await
    }

    /// Push unsynced records of `path` to the replica.
    pub async fn sync(
        &self,
        path: &DatasetPath,
        cancel: &CancellationToken,
    ) -> RepositoryResult<SyncReport> {
        let tx = self.begin(path).await?;
        tx.sync(cancel).await
    }

    pub(crate) async fn store_bytes(
        &self,
        path: &DatasetPath,
        data: Vec<u8>,
    ) -> RepositoryResult<ContentHash> {
        let store = Arc::clone(&self.store);
        let worktree = self.worktree.clone();
        let target = path.clone();
        let added = tokio::task::spawn_blocking(move || -> Result<ContentHash, StoreError> {
            let hash = store.write(&data)?;
            worktree.write(&target, &data)?;
            Ok(hash)
        })
        .await
        .map_err(|e| RepositoryError::Task(e.to_string()))?;

        let hash = added.map_err(|source| RepositoryError::AddFailed {
            path: path.clone(),
            source,
        })?;
        debug!(%path, hash = %hash.short_hex(), "content staged");
        Ok(hash)
    }

    pub(crate) async fn store_file(
        &self,
        path: &DatasetPath,
        source: PathBuf,
        expected: ContentHash,
    ) -> RepositoryResult<(ContentHash, u64)> {
        let store = Arc::clone(&self.store);
        let worktree = self.worktree.clone();
        let target = path.clone();
        let added = tokio::task::spawn_blocking(move || -> Result<(ContentHash, u64), StoreError> {
            let hash = store.import_file(&source, &expected)?;
            let size = std::fs::metadata(&source)?.len();
            worktree.copy_from(&target, &source)?;
            Ok((hash, size))
        })
        .await
        .map_err(|e| RepositoryError::Task(e.to_string()))?;

        let (hash, size) = added.map_err(|source| RepositoryError::AddFailed {
            path: path.clone(),
            source,
        })?;
        debug!(%path, hash = %hash.short_hex(), size, "file staged");
        Ok((hash, size))
    }

    pub(crate) async fn append_record(
        &self,
        path: &DatasetPath,
        hash: ContentHash,
        size: u64,
        message: &str,
    ) -> RepositoryResult<VersionRecord> {
        let commit_failed = |source: HistoryError| match source {
            HistoryError::Unchanged { path } => RepositoryError::NoChanges { path },
            source => RepositoryError::CommitFailed {
                path: path.clone(),
                source,
            },
        };

        // `History::append` compares against the head under its write lock.
        let history = Arc::clone(&self.history);
        let draft = RecordDraft {
            path: path.clone(),
            content_hash: hash,
            size,
            message: message.to_string(),
        };
        let record = tokio::task::spawn_blocking(move || history.append(draft))
            .await
            .map_err(|e| RepositoryError::Task(e.to_string()))?
            .map_err(commit_failed)?;

        info!(
            %path,
            seq = record.seq,
            commit = %record.commit_id.short_hex(),
            hash = %hash.short_hex(),
            "version committed"
        );
        Ok(record)
    }

    pub(crate) async fn sync_locked(
        &self,
        path: &DatasetPath,
        cancel: &CancellationToken,
    ) -> RepositoryResult<SyncReport> {
        let sync_failed = |source: ReplicaError| RepositoryError::SyncFailed {
            path: path.clone(),
            source,
        };
        let replica = self
            .replica
            .as_ref()
            .ok_or_else(|| sync_failed(ReplicaError::NotConfigured))?;

        let pending = self.history.unsynced(path)?;
        let head = self.history.head(path)?.map(|r| r.commit_id);
        if pending.is_empty() {
            return Ok(SyncReport {
                path: path.clone(),
                records_pushed: 0,
                objects_pushed: 0,
                head,
            });
        }

        let mut seen = HashSet::new();
        let mut blobs = Vec::new();
        for record in &pending {
            if seen.insert(record.content_hash) {
                let data = self.read_blob(record.content_hash).await?;
                blobs.push((record.content_hash, data));
            }
        }
        let objects_pushed = blobs.len();

        let push = async {
            replica.push_objects(blobs).await?;
            replica.push_records(pending.clone()).await
        };
        let pushed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReplicaError::Cancelled),
            result = push => result,
        };
        pushed.map_err(sync_failed)?;

        for record in &pending {
            self.history.mark_synced(&record.commit_id)?;
        }

        info!(%path, records = pending.len(), objects = objects_pushed, "sync complete");
        Ok(SyncReport {
            path: path.clone(),
            records_pushed: pending.len(),
            objects_pushed,
            head,
        })
    }

    async fn read_blob(&self, hash: ContentHash) -> RepositoryResult<Vec<u8>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.read_required(&hash))
            .await
            .map_err(|e| RepositoryError::Task(e.to_string()))?
            .map_err(Into::into)
    }

    // ---- Reads ----

    /// The record `commit`, provided it belongs to `path`.
    pub fn record_for(&self, commit: &CommitId, path: &DatasetPath) -> ResolveResult<VersionRecord> {
        match self.history.get(commit)? {
            Some(record) if record.path == *path => Ok(record),
            _ => Err(ResolveError::NotFound {
                commit: *commit,
                path: path.clone(),
            }),
        }
    }

    /// Exact bytes committed as `commit` on `path`.
    pub async fn resolve(&self, commit: &CommitId, path: &DatasetPath) -> ResolveResult<Vec<u8>> {
        let record = self.record_for(commit, path)?;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.read_required(&record.content_hash))
            .await
            .map_err(|e| ResolveError::Task(e.to_string()))?
            .map_err(Into::into)
    }

    /// Raw line hunks between two commits of `path`.
    pub async fn diff(
        &self,
        commit_a: &CommitId,
        commit_b: &CommitId,
        path: &DatasetPath,
    ) -> ResolveResult<BlobDiff> {
        let old = self.resolve(commit_a, path).await?;
        let new = self.resolve(commit_b, path).await?;
        Ok(diff_blobs(&old, &new, DEFAULT_CONTEXT))
    }

    /// Records on `path`, newest first.
    pub fn log(&self, path: &DatasetPath) -> RepositoryResult<Vec<VersionRecord>> {
        let mut records = self.history.records(path)?;
        records.reverse();
        Ok(records)
    }

    pub fn head(&self, path: &DatasetPath) -> RepositoryResult<Option<VersionRecord>> {
        Ok(self.history.head(path)?)
    }

    pub fn commit_count(&self, path: &DatasetPath) -> RepositoryResult<u64> {
        Ok(self.history.commit_count(path)?)
    }

    pub fn paths(&self) -> RepositoryResult<Vec<DatasetPath>> {
        Ok(self.history.paths()?)
    }

    pub fn unsynced(&self, path: &DatasetPath) -> RepositoryResult<Vec<VersionRecord>> {
        Ok(self.history.unsynced(path)?)
    }

    /// Re-check ids, links and sequence numbers of `path`, and that every
    /// referenced blob exists and hashes to its key.
    pub async fn verify(&self, path: &DatasetPath) -> RepositoryResult<VerifyReport> {
        let records = self.history.records(path)?;
        let mut problems = Vec::new();

        match self.history.verify_chain(path) {
            Ok(()) => {}
            Err(HistoryError::Integrity { source, .. }) => problems.push(VerifyProblem::Chain {
                detail: source.to_string(),
            }),
            Err(e) => return Err(e.into()),
        }

        for record in &records {
            let store = Arc::clone(&self.store);
            let hash = record.content_hash;
            let read = tokio::task::spawn_blocking(move || store.read(&hash))
                .await
                .map_err(|e| RepositoryError::Task(e.to_string()))?;
            match read {
                Ok(Some(data)) if hash.matches(&data) => {}
                Ok(Some(_)) | Err(StoreError::HashMismatch { .. }) => {
                    problems.push(VerifyProblem::CorruptBlob {
                        commit: record.commit_id,
                        hash,
                    })
                }
                Ok(None) => problems.push(VerifyProblem::MissingBlob {
                    commit: record.commit_id,
                    hash,
                }),
                Err(e) => return Err(e.into()),
            }
        }

        info!(%path, records = records.len(), problems = problems.len(), "verify complete");
        Ok(VerifyReport {
            path: path.clone(),
            records_checked: records.len(),
            problems,
        })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("replica", &self.replica.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::InMemoryReplica;
    use std::time::Duration;

    fn path(p: &str) -> DatasetPath {
        DatasetPath::new(p).unwrap()
    }

    fn temp_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::open(dir.path(), RepositoryOptions::default()).unwrap();
        (dir, repo)
    }

    fn repo_with_replica() -> (tempfile::TempDir, Repository, Arc<InMemoryReplica>) {
        let dir = tempfile::tempdir().unwrap();
        let replica = Arc::new(InMemoryReplica::new());
        let repo = Repository::open(
            dir.path(),
            RepositoryOptions {
                replica: Some(replica.clone()),
            },
        )
        .unwrap();
        (dir, repo, replica)
    }

    fn blob_file(root: &Path, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    // -----------------------------------------------------------------------
    // Ingestion and history
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn ingest_records_hash_and_worktree() {
        let (_dir, repo) = temp_repo();
        let record = repo
            .ingest_bytes(&path("t.csv"), b"a,b\n1,2\n", "first")
            .await
            .unwrap();

        assert_eq!(record.content_hash, ContentHash::compute(b"a,b\n1,2\n"));
        assert_eq!(record.size, 8);
        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 1);
        assert_eq!(
            repo.worktree().read(&path("t.csv")).unwrap().as_deref(),
            Some(&b"a,b\n1,2\n"[..])
        );
        assert_eq!(
            repo.resolve(&record.commit_id, &path("t.csv")).await.unwrap(),
            b"a,b\n1,2\n"
        );
    }

    #[tokio::test]
    async fn history_is_append_only() {
        let (_dir, repo) = temp_repo();
        let mut commits = Vec::new();
        for i in 0..5 {
            let content = format!("v\n{i}\n");
            let record = repo
                .ingest_bytes(&path("t.csv"), content.as_bytes(), "update")
                .await
                .unwrap();
            commits.push((record.commit_id, content));
        }

        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 5);
        let log = repo.log(&path("t.csv")).unwrap();
        assert_eq!(log[0].seq, 5);
        assert_eq!(log[4].seq, 1);
        for (commit, content) in commits {
            assert_eq!(repo.resolve(&commit, &path("t.csv")).await.unwrap(), content.as_bytes());
        }
        assert!(repo.verify(&path("t.csv")).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn commit_without_put_is_no_changes() {
        let (_dir, repo) = temp_repo();
        let mut tx = repo.begin(&path("t.csv")).await.unwrap();
        assert!(matches!(
            tx.commit("empty").await,
            Err(RepositoryError::NoChanges { .. })
        ));
    }

    #[tokio::test]
    async fn dropped_commit_still_counts_toward_no_changes() {
        let (_dir, repo) = temp_repo();
        {
            let mut tx = repo.begin(&path("t.csv")).await.unwrap();
            tx.put(b"same\n").await.unwrap();
            // Either outcome is fine; the append may still be running after the drop.
            let _ = tokio::time::timeout(Duration::ZERO, tx.commit("first")).await;
        }

        let mut tx = repo.begin(&path("t.csv")).await.unwrap();
        tx.put(b"same\n").await.unwrap();
        match tx.commit("again").await {
            Ok(_) | Err(RepositoryError::NoChanges { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
        drop(tx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 1);
    }

    #[tokio::test]
    async fn unchanged_content_is_no_changes() {
        let (_dir, repo) = temp_repo();
        repo.ingest_bytes(&path("t.csv"), b"same\n", "first").await.unwrap();
        let err = repo
            .ingest_bytes(&path("t.csv"), b"same\n", "again")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NoChanges { .. }));
        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 1);
    }

    #[tokio::test]
    async fn put_file_stages_fetched_content() {
        let (dir, repo) = temp_repo();
        let staged = dir.path().join("incoming.json");
        std::fs::write(&staged, br#"{"a":1}"#).unwrap();
        let expected = ContentHash::compute(br#"{"a":1}"#);

        let mut tx = repo.begin(&path("d.json")).await.unwrap();
        assert_eq!(tx.put_file(&staged, &expected).await.unwrap(), expected);
        assert_eq!(tx.staged(), Some(expected));
        let record = tx.commit("fetched").await.unwrap();
        assert_eq!(record.size, 7);
    }

    #[tokio::test]
    async fn put_file_with_wrong_hash_is_add_failed() {
        let (dir, repo) = temp_repo();
        let staged = dir.path().join("incoming.csv");
        std::fs::write(&staged, b"x").unwrap();

        let mut tx = repo.begin(&path("t.csv")).await.unwrap();
        let err = tx
            .put_file(&staged, &ContentHash::compute(b"y"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AddFailed { .. }));
        assert_eq!(tx.staged(), None);
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let commit = {
            let repo = Repository::open(dir.path(), RepositoryOptions::default()).unwrap();
            repo.ingest_bytes(&path("a/t.csv"), b"1\n", "one").await.unwrap();
            repo.ingest_bytes(&path("a/t.csv"), b"2\n", "two").await.unwrap().commit_id
        };

        let repo = Repository::open(dir.path(), RepositoryOptions::default()).unwrap();
        assert_eq!(repo.paths().unwrap(), vec![path("a/t.csv")]);
        assert_eq!(repo.head(&path("a/t.csv")).unwrap().unwrap().commit_id, commit);
        assert_eq!(repo.resolve(&commit, &path("a/t.csv")).await.unwrap(), b"2\n");
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingestions_all_commit() {
        let (_dir, repo) = temp_repo();
        let repo = Arc::new(repo);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    let content = format!("id\n{i}\n");
                    let record = repo
                        .ingest_bytes(&path("t.csv"), content.as_bytes(), "concurrent")
                        .await
                        .unwrap();
                    (record.commit_id, content)
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 8);
        let seqs: Vec<u64> = repo.log(&path("t.csv")).unwrap().iter().rev().map(|r| r.seq).collect();
        assert_eq!(seqs, (1..=8).collect::<Vec<_>>());
        for (commit, content) in results {
            assert_eq!(repo.resolve(&commit, &path("t.csv")).await.unwrap(), content.as_bytes());
        }
        assert!(repo.verify(&path("t.csv")).await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_concurrent_ingestions_keep_earlier_version() {
        let (_dir, repo) = temp_repo();
        let repo = Arc::new(repo);

        let first = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.ingest_bytes(&path("t.csv"), b"a\n1\n", "x").await })
        };
        let second = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.ingest_bytes(&path("t.csv"), b"a\n2\n", "y").await })
        };
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 2);
        let (earlier, later) = if first.seq < second.seq {
            (first, second)
        } else {
            (second, first)
        };
        assert_eq!(later.parent, Some(earlier.commit_id));
        let earlier_bytes = repo.resolve(&earlier.commit_id, &path("t.csv")).await.unwrap();
        assert!(earlier.content_hash.matches(&earlier_bytes));
    }

    #[tokio::test]
    async fn transaction_blocks_same_path_writers() {
        let (_dir, repo) = temp_repo();
        let repo = Arc::new(repo);

        let mut tx = repo.begin(&path("t.csv")).await.unwrap();
        let contender = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.ingest_bytes(&path("t.csv"), b"second\n", "b").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 0);

        tx.put(b"first\n").await.unwrap();
        let first = tx.commit("a").await.unwrap();
        drop(tx);

        let second = contender.await.unwrap().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn other_paths_proceed_during_transaction() {
        let (_dir, repo) = temp_repo();
        let _tx = repo.begin(&path("a.csv")).await.unwrap();
        let other = tokio::time::timeout(
            Duration::from_secs(5),
            repo.ingest_bytes(&path("b.csv"), b"b\n", "m"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(other.seq, 1);
    }

    // -----------------------------------------------------------------------
    // Resolve and raw diff
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn resolve_unknown_commit_is_not_found() {
        let (_dir, repo) = temp_repo();
        repo.ingest_bytes(&path("t.csv"), b"x\n", "m").await.unwrap();
        let err = repo
            .resolve(&CommitId::from_hash([9; 32]), &path("t.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_commit_of_other_path_is_not_found() {
        let (_dir, repo) = temp_repo();
        let record = repo.ingest_bytes(&path("a.csv"), b"x\n", "m").await.unwrap();
        assert!(matches!(
            repo.resolve(&record.commit_id, &path("b.csv")).await,
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn raw_diff_between_commits() {
        let (_dir, repo) = temp_repo();
        let a = repo.ingest_bytes(&path("t.csv"), b"id\n1\n", "a").await.unwrap();
        let b = repo.ingest_bytes(&path("t.csv"), b"id\n1\n2\n", "b").await.unwrap();
        let diff = repo.diff(&a.commit_id, &b.commit_id, &path("t.csv")).await.unwrap();
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 0);
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sync_pushes_unsynced_records() {
        let (_dir, repo, replica) = repo_with_replica();
        repo.ingest_bytes(&path("t.csv"), b"1\n", "a").await.unwrap();
        let head = repo.ingest_bytes(&path("t.csv"), b"2\n", "b").await.unwrap();

        let report = repo.sync(&path("t.csv"), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.records_pushed, 2);
        assert_eq!(report.objects_pushed, 2);
        assert_eq!(report.head, Some(head.commit_id));
        assert!(repo.unsynced(&path("t.csv")).unwrap().is_empty());
        assert_eq!(
            replica.remote_head(&path("t.csv")).await.unwrap(),
            Some(head.commit_id)
        );

        let again = repo.sync(&path("t.csv"), &CancellationToken::new()).await.unwrap();
        assert_eq!(again.records_pushed, 0);
    }

    #[tokio::test]
    async fn failed_sync_keeps_local_commits() {
        let (_dir, repo, replica) = repo_with_replica();
        let record = repo.ingest_bytes(&path("t.csv"), b"1\n", "a").await.unwrap();

        replica.set_online(false);
        let err = repo.sync(&path("t.csv"), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::SyncFailed { source: ReplicaError::Unavailable(_), .. }
        ));
        assert_eq!(repo.commit_count(&path("t.csv")).unwrap(), 1);
        assert_eq!(repo.unsynced(&path("t.csv")).unwrap(), vec![record]);

        replica.set_online(true);
        let report = repo.sync(&path("t.csv"), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.records_pushed, 1);
    }

    #[tokio::test]
    async fn sync_without_replica_fails() {
        let (_dir, repo) = temp_repo();
        repo.ingest_bytes(&path("t.csv"), b"1\n", "a").await.unwrap();
        assert!(matches!(
            repo.sync(&path("t.csv"), &CancellationToken::new()).await,
            Err(RepositoryError::SyncFailed { source: ReplicaError::NotConfigured, .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_sync_marks_nothing() {
        let (_dir, repo, _replica) = repo_with_replica();
        repo.ingest_bytes(&path("t.csv"), b"1\n", "a").await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            repo.sync(&path("t.csv"), &cancel).await,
            Err(RepositoryError::SyncFailed { source: ReplicaError::Cancelled, .. })
        ));
        assert_eq!(repo.unsynced(&path("t.csv")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sync_inside_transaction() {
        let (_dir, repo, _replica) = repo_with_replica();
        let mut tx = repo.begin(&path("t.csv")).await.unwrap();
        tx.put(b"1\n").await.unwrap();
        tx.commit("a").await.unwrap();
        let report = tx.sync(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.records_pushed, 1);
    }

    // -----------------------------------------------------------------------
    // Verify
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn verify_detects_corrupt_and_missing_blobs() {
        let (dir, repo) = temp_repo();
        let a = repo.ingest_bytes(&path("t.csv"), b"1\n", "a").await.unwrap();
        let b = repo.ingest_bytes(&path("t.csv"), b"2\n", "b").await.unwrap();

        std::fs::write(blob_file(dir.path(), &a.content_hash), b"tampered").unwrap();
        std::fs::remove_file(blob_file(dir.path(), &b.content_hash)).unwrap();

        let report = repo.verify(&path("t.csv")).await.unwrap();
        assert_eq!(report.records_checked, 2);
        assert_eq!(
            report.problems,
            vec![
                VerifyProblem::CorruptBlob { commit: a.commit_id, hash: a.content_hash },
                VerifyProblem::MissingBlob { commit: b.commit_id, hash: b.content_hash },
            ]
        );
    }
}
