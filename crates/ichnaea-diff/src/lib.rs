//! Diff engine for Ichnaea.
//!
//! Two views over the same Myers line diff:
//!
//! - [`StructuralDiff`] / [`ChangeSegment`] -- the full ordered sequence of
//!   equal, added and removed runs between two canonical texts. Every line
//!   of both inputs appears exactly once, so either side can be rebuilt.
//! - [`BlobDiff`] / [`DiffHunk`] / [`DiffLine`] -- unified-style hunks with
//!   context, for raw content where no format is known.

pub mod blob_diff;
pub mod segments;

pub use blob_diff::{diff_blobs, BlobDiff, DiffHunk, DiffLine, DEFAULT_CONTEXT};
pub use segments::{diff_texts, ChangeKind, ChangeSegment, StructuralDiff};
