//! High-level SDK for Ichnaea.
//!
//! [`Ichnaea`] ties the subsystems together: it fetches a locator into a
//! staging file while hashing it, commits the file to the dataset's path in
//! the [`Repository`](ichnaea_repo::Repository), registers the dataset with a
//! [`MetadataStore`], and answers format-aware diff requests through the
//! [`VersionDiffCoordinator`]. Notarization is an independent follow-up.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metadata;
pub mod notary;
pub mod retry;

pub use client::{DiffTarget, Ichnaea, IchnaeaBuilder, IngestOutcome, IngestRequest, SyncStatus};
pub use config::{ConfigError, FetchConfig, IchnaeaConfig, NotarizeConfig, RetryConfig, SyncConfig};
pub use coordinator::{
    DiffFailure, DiffFailureKind, DiffRequest, DiffStage, Side, VersionDiff, VersionDiffCoordinator,
};
pub use error::{IngestError, SdkError, SdkResult};
pub use metadata::{DatasetRecord, InMemoryMetadataStore, MetadataError, MetadataStore, NewDataset};
pub use notary::{AnchorReceipt, AnchorRequest, InMemoryNotary, NotarizeError, Notarizer};
pub use retry::RetryPolicy;

// Re-export key types
pub use ichnaea_diff::{BlobDiff, ChangeKind, ChangeSegment, StructuralDiff};
pub use ichnaea_formats::DocumentFormat;
pub use ichnaea_history::VersionRecord;
pub use ichnaea_repo::{Repository, SyncReport, VerifyReport};
pub use ichnaea_types::{CommitId, ContentHash, DatasetPath};
