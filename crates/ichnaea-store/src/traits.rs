use std::path::Path;

use ichnaea_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written; the same bytes always map to the
///   same hash.
/// - Write-then-link: write the blob, verify the hash, then return it.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read a blob by its content hash.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>>;

    /// Write a blob and return its content hash.
    ///
    /// If the blob already exists, this is a no-op (idempotent).
    fn write(&self, data: &[u8]) -> StoreResult<ContentHash>;

    /// Check whether a blob exists in the store.
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// Import a file whose hash the caller already computed.
    ///
    /// The stored blob must hash to `expected`; otherwise nothing is stored
    /// and [`StoreError::HashMismatch`] is returned. The default
    /// implementation reads the whole file; backends may override to move
    /// the file into place instead.
    fn import_file(&self, source: &Path, expected: &ContentHash) -> StoreResult<ContentHash> {
        let data = std::fs::read(source)?;
        let computed = ContentHash::compute(&data);
        if computed != *expected {
            return Err(StoreError::HashMismatch {
                expected: *expected,
                computed,
            });
        }
        self.write(&data)
    }

    /// Read a blob, failing with [`StoreError::NotFound`] if it is absent.
    fn read_required(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.read(hash)?.ok_or(StoreError::NotFound(*hash))
    }
}
