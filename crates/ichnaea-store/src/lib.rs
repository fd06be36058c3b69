//! Content-addressed blob storage for Ichnaea.
//!
//! Every committed dataset version is stored as an immutable blob keyed by
//! its [`ContentHash`](ichnaea_types::ContentHash), analogous to git's
//! `.git/objects/` directory.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- on-disk store with two-character fan-out directories
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write the blob, verify its hash, then publish it.
//! 3. Concurrent reads are always safe.
//! 4. The store never interprets blob contents.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
