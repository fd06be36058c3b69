use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::locator::Locator;

/// A stream of body chunks.
pub type ByteStream = BoxStream<'static, FetchResult<Bytes>>;

/// Something that can open a locator as a stream of bytes.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Open the locator. Errors that are known before the first byte (bad
    /// status, missing file) are returned here rather than from the stream.
    async fn open(&self, locator: &Locator) -> FetchResult<ByteStream>;
}

/// HTTP(S) source backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a source that sends the given `User-Agent`.
    pub fn new(user_agent: &str) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn open(&self, locator: &Locator) -> FetchResult<ByteStream> {
        let Locator::Http(url) = locator else {
            return Err(FetchError::UnsupportedScheme(locator.to_string()));
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), "HTTP response");
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                locator: url.to_string(),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| FetchError::Network(e.to_string())))
            .boxed())
    }
}

/// Local file source.
#[derive(Clone, Debug, Default)]
pub struct FileSource;

#[async_trait]
impl ByteSource for FileSource {
    async fn open(&self, locator: &Locator) -> FetchResult<ByteStream> {
        let Locator::File(path) = locator else {
            return Err(FetchError::UnsupportedScheme(locator.to_string()));
        };

        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ReaderStream::new(file)
            .map(|chunk| chunk.map_err(FetchError::Io))
            .boxed())
    }
}

/// Dispatches to [`HttpSource`] or [`FileSource`] by locator scheme.
#[derive(Clone, Debug)]
pub struct LocatorSource {
    http: HttpSource,
    file: FileSource,
}

impl LocatorSource {
    pub fn new(user_agent: &str) -> FetchResult<Self> {
        Ok(Self {
            http: HttpSource::new(user_agent)?,
            file: FileSource,
        })
    }
}

#[async_trait]
impl ByteSource for LocatorSource {
    async fn open(&self, locator: &Locator) -> FetchResult<ByteStream> {
        match locator {
            Locator::Http(_) => self.http.open(locator).await,
            Locator::File(_) => self.file.open(locator).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn file_source_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        tokio::fs::write(&path, b"a,b\n1,2\n").await.unwrap();

        let stream = FileSource.open(&Locator::from_path(&path)).await.unwrap();
        assert_eq!(collect(stream).await, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn file_source_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource
            .open(&Locator::from_path(dir.path().join("absent.csv")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn file_source_rejects_http_locator() {
        let loc = Locator::parse("http://127.0.0.1/x").unwrap();
        assert!(matches!(
            FileSource.open(&loc).await,
            Err(FetchError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn locator_source_dispatches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.json");
        tokio::fs::write(&path, b"{}").await.unwrap();

        let source = LocatorSource::new("ichnaea-test").unwrap();
        let stream = source.open(&Locator::from_path(&path)).await.unwrap();
        assert_eq!(collect(stream).await, b"{}");
    }
}
