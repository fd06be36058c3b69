use std::time::Duration;

/// Errors from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The locator could not be parsed.
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// The locator's scheme has no registered source.
    #[error("unsupported locator scheme: {0}")]
    UnsupportedScheme(String),

    /// The source reported that the resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The HTTP server answered with a non-success status.
    #[error("HTTP status {status} fetching {locator}")]
    Http { status: u16, locator: String },

    /// Connection-level failure while opening or reading the stream.
    #[error("network error: {0}")]
    Network(String),

    /// The fetch did not complete within the caller's deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the fetch.
    #[error("fetch cancelled")]
    Cancelled,

    /// Local I/O failure while writing the destination.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;
