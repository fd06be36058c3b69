use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use ichnaea_crypto::ContentDigest;
use ichnaea_types::ContentHash;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FetchError, FetchResult};
use crate::locator::Locator;
use crate::source::{ByteSource, LocatorSource};

/// Per-call fetch options.
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Upper bound on the whole fetch, including connection setup.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(60))
    }
}

/// Result of a completed fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOutcome {
    /// SHA-256 of exactly the bytes written to `destination`.
    pub content_hash: ContentHash,
    pub size: u64,
    pub destination: PathBuf,
}

/// Streams a locator to disk while hashing it.
pub struct HashingFetcher<S = LocatorSource> {
    source: S,
}

impl<S: ByteSource> HashingFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch `locator` into `destination`.
    ///
    /// The destination is replaced atomically on success. On any error the
    /// temporary file is dropped (and so deleted) before returning.
    pub async fn fetch_to(
        &self,
        locator: &Locator,
        destination: &Path,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchOutcome> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let temp = NamedTempFile::new_in(&dir)?;
        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        debug!(%locator, temp = %temp.path().display(), "fetch started");

        let (content_hash, size) =
            bounded(options, cancel, self.stream_into(locator, &mut file)).await?;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        temp.persist(destination).map_err(|e| FetchError::Io(e.error))?;

        info!(
            %locator,
            hash = %content_hash.short_hex(),
            size,
            "fetch complete"
        );
        Ok(FetchOutcome {
            content_hash,
            size,
            destination: destination.to_path_buf(),
        })
    }

    /// Fetch into memory. Used when the caller needs the bytes rather than
    /// a file (small payloads and tests).
    pub async fn fetch_bytes(
        &self,
        locator: &Locator,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> FetchResult<(ContentHash, Vec<u8>)> {
        let transfer = async {
            let mut stream = self.source.open(locator).await?;
            let mut digest = ContentDigest::new();
            let mut out = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                digest.update(&chunk);
                out.extend_from_slice(&chunk);
            }
            Ok::<_, FetchError>((digest.finalize(), out))
        };
        bounded(options, cancel, transfer).await
    }

    async fn stream_into(
        &self,
        locator: &Locator,
        file: &mut tokio::fs::File,
    ) -> FetchResult<(ContentHash, u64)> {
        let mut stream = self.source.open(locator).await?;
        let mut digest = ContentDigest::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            digest.update(&chunk);
            file.write_all(&chunk).await?;
        }
        let size = digest.len();
        Ok((digest.finalize(), size))
    }
}

/// Run `work` under the caller's deadline and cancellation token.
async fn bounded<T>(
    options: &FetchOptions,
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = FetchResult<T>>,
) -> FetchResult<T> {
    match options.timeout {
        Some(limit) => tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = tokio::time::timeout(limit, work) => {
                res.map_err(|_| FetchError::Timeout(limit)).and_then(|r| r)
            }
        },
        None => tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = work => res,
        },
    }
}
