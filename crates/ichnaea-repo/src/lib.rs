//! Versioned dataset repository for Ichnaea.
//!
//! A [`Repository`] owns three things under its root directory:
//!
//! - `objects/` -- content-addressed blobs ([`FsObjectStore`](ichnaea_store::FsObjectStore))
//! - `worktree/<path>` -- the current content of every tracked path
//! - `history.log` -- the journaled, append-only version history
//!
//! Mutations of one dataset path go through a [`PathTransaction`], which
//! holds that path's critical section for its whole lifetime: staging
//! content, committing it, and syncing to a [`Replica`] can never interleave
//! with another writer of the same path. Distinct paths proceed in parallel
//! and reads never take a path lock.

pub mod error;
pub mod locks;
pub mod replica;
pub mod repository;
pub mod transaction;
pub mod worktree;

pub use error::{
    ReplicaError, ReplicaResult, RepositoryError, RepositoryResult, ResolveError, ResolveResult,
};
pub use replica::{DirectoryReplica, InMemoryReplica, Replica};
pub use repository::{Repository, RepositoryOptions, SyncReport, VerifyProblem, VerifyReport};
pub use transaction::PathTransaction;
pub use worktree::Worktree;
