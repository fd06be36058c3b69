//! Foundation types for Ichnaea.
//!
//! This crate provides the identifiers shared by every other Ichnaea crate.
//! It has no I/O and no async code.
//!
//! # Key Types
//!
//! - [`ContentHash`]: SHA-256 digest of a blob's exact bytes
//! - [`CommitId`]: self-verifying identifier of a version record
//! - [`DatasetPath`]: validated relative path of a tracked dataset file

pub mod commit;
pub mod content;
pub mod error;
mod hex32;
pub mod path;

pub use commit::CommitId;
pub use content::ContentHash;
pub use error::TypeError;
pub use path::DatasetPath;
