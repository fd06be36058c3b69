use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use ichnaea_crypto::ContentDigest;
use ichnaea_types::ContentHash;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// On-disk blob store.
///
/// Layout: `<root>/<first two hex chars>/<remaining 62 hex chars>`. Blobs are
/// written to a temporary file in the fan-out directory, fsynced, then
/// renamed into place, so a reader never observes a partial blob. Every read
/// re-hashes the bytes and reports corruption as [`StoreError::HashMismatch`].
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a blob (whether or not it exists).
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    fn fan_out_dir(&self, hash: &ContentHash) -> StoreResult<PathBuf> {
        let hex = hash.to_hex();
        let dir = self.root.join(&hex[..2]);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn publish(&self, temp: NamedTempFile, hash: &ContentHash) -> StoreResult<()> {
        temp.as_file().sync_all()?;
        let target = self.blob_path(hash);
        temp.persist(&target).map_err(|e| StoreError::Io(e.error))?;
        debug!(hash = %hash.short_hex(), "blob written");
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let data = match fs::read(self.blob_path(hash)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let computed = ContentHash::compute(&data);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                expected: *hash,
                computed,
            });
        }
        Ok(Some(data))
    }

    fn write(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::compute(data);
        if self.exists(&hash)? {
            return Ok(hash);
        }
        let mut temp = NamedTempFile::new_in(self.fan_out_dir(&hash)?)?;
        temp.write_all(data)?;
        self.publish(temp, &hash)?;
        Ok(hash)
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blob_path(hash).is_file())
    }

    /// Streams the source through a digest while copying, so large staged
    /// files are never held in memory.
    fn import_file(&self, source: &Path, expected: &ContentHash) -> StoreResult<ContentHash> {
        if self.exists(expected)? {
            return Ok(*expected);
        }
        let mut input = File::open(source)?;
        let mut temp = NamedTempFile::new_in(self.fan_out_dir(expected)?)?;
        let mut digest = ContentDigest::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
            temp.write_all(&buf[..n])?;
        }
        let computed = digest.finalize();
        if computed != *expected {
            return Err(StoreError::HashMismatch {
                expected: *expected,
                computed,
            });
        }
        self.publish(temp, expected)?;
        Ok(computed)
    }
}
