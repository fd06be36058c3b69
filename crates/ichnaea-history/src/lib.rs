//! Append-only version history for Ichnaea.
//!
//! Each dataset path owns a linear chain of [`VersionRecord`]s. A record's
//! [`CommitId`](ichnaea_types::CommitId) is the domain-separated BLAKE3 hash
//! of its other fields, including the parent link, so the chain is
//! self-verifying. Records are persisted to a CRC-framed [`Journal`] before
//! they become visible; sync markers are separate journal entries so a
//! record is never rewritten.

pub mod error;
pub mod history;
pub mod journal;
pub mod record;

pub use error::{HistoryError, HistoryResult};
pub use history::History;
pub use journal::{Journal, JournalEntry};
pub use record::{RecordDraft, VersionRecord};
