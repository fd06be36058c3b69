use ichnaea_fetch::FetchError;
use ichnaea_repo::{ReplicaError, RepositoryError, ResolveError};
use ichnaea_types::{CommitId, TypeError};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::coordinator::DiffFailure;
use crate::metadata::MetadataError;
use crate::notary::NotarizeError;

/// Errors from the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid dataset name {name:?}: {source}")]
    InvalidName {
        name: String,
        #[source]
        source: TypeError,
    },

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The version was committed but could not be registered. The commit
    /// stands; only the metadata entry is missing.
    #[error("committed {commit_id} but metadata registration failed: {source}")]
    Metadata {
        commit_id: CommitId,
        #[source]
        source: MetadataError,
    },

    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Diff(#[from] DiffFailure),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("notarization error: {0}")]
    Notarize(#[from] NotarizeError),

    #[error("replica error: {0}")]
    Replica(#[from] ReplicaError),

    #[error("fetch setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("unknown dataset: {0}")]
    UnknownDataset(Uuid),

    #[error(transparent)]
    InvalidPath(#[from] TypeError),
}

pub type SdkResult<T> = Result<T, SdkError>;
