use ichnaea_history::HistoryError;
use ichnaea_store::StoreError;
use ichnaea_types::{CommitId, ContentHash, DatasetPath, TypeError};

/// Errors from repository mutations and maintenance.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Nothing staged, or the staged content equals the current head.
    #[error("no changes to commit on {path}")]
    NoChanges { path: DatasetPath },

    /// Writing the blob or working-tree file failed.
    #[error("failed to add content to {path}: {source}")]
    AddFailed {
        path: DatasetPath,
        #[source]
        source: StoreError,
    },

    /// Appending the version record failed; nothing was committed.
    #[error("failed to commit {path}: {source}")]
    CommitFailed {
        path: DatasetPath,
        #[source]
        source: HistoryError,
    },

    /// Pushing to the replica failed; local commits are kept and stay unsynced.
    #[error("failed to sync {path}: {source}")]
    SyncFailed {
        path: DatasetPath,
        #[source]
        source: ReplicaError,
    },

    #[error(transparent)]
    InvalidPath(#[from] TypeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path lock registry poisoned")]
    LockPoisoned,

    #[error("background task failed: {0}")]
    Task(String),
}

/// Result alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors from resolving a commit to its bytes.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The commit is unknown or belongs to a different path.
    #[error("commit {commit} not found for {path}")]
    NotFound { commit: CommitId, path: DatasetPath },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors reported by a replica.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("no replica configured")]
    NotConfigured,

    #[error("replica unavailable: {0}")]
    Unavailable(String),

    #[error("replica rejected commit {commit}: {reason}")]
    Rejected { commit: CommitId, reason: String },

    #[error("replica is missing blob {0}")]
    MissingObject(ContentHash),

    #[error("sync cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ReplicaError {
    /// Whether retrying the same push could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplicaError::Unavailable(_) | ReplicaError::Task(_))
    }
}

pub type ReplicaResult<T> = Result<T, ReplicaError>;
