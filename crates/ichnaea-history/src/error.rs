use std::path::PathBuf;

use ichnaea_crypto::ChainError;
use ichnaea_types::{CommitId, DatasetPath};

/// Errors produced by history operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("journal {} is damaged at byte {offset}", journal.display())]
    Corrupt { journal: PathBuf, offset: u64 },

    #[error("content matches the head of {path}")]
    Unchanged { path: DatasetPath },

    #[error("chain integrity violation on {path}: {source}")]
    Integrity {
        path: DatasetPath,
        #[source]
        source: ChainError,
    },

    #[error("commit {0} is not in this history")]
    UnknownCommit(CommitId),

    #[error("commit {commit} already recorded at a different position on {path}")]
    Conflict { path: DatasetPath, commit: CommitId },

    #[error("history lock poisoned")]
    LockPoisoned,
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
