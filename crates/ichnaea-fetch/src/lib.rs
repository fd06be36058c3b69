//! Streaming fetch-and-hash for Ichnaea.
//!
//! The [`HashingFetcher`] pulls bytes from a [`ByteSource`], feeding each
//! chunk to a SHA-256 accumulator and to a temporary file in the same step.
//! The temporary file is renamed onto the destination only after the stream
//! completes; on any failure (source error, write error, timeout, or
//! cancellation) it is removed and the destination is left untouched.
//!
//! # Sources
//!
//! - [`HttpSource`] -- `http://` and `https://` via a streaming `reqwest` body
//! - [`FileSource`] -- `file://` via a buffered tokio reader
//! - [`LocatorSource`] -- dispatches on the locator scheme

pub mod error;
pub mod fetcher;
pub mod locator;
pub mod source;

pub use error::{FetchError, FetchResult};
pub use fetcher::{FetchOptions, FetchOutcome, HashingFetcher};
pub use locator::Locator;
pub use source::{ByteSource, ByteStream, FileSource, HttpSource, LocatorSource};
