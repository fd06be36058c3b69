use chrono::{DateTime, Utc};
use ichnaea_crypto::{ChainLink, ContentHasher};
use ichnaea_types::{CommitId, ContentHash, DatasetPath};
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// One committed version of a dataset path. Never mutated once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub commit_id: CommitId,
    pub path: DatasetPath,
    /// 1-based position in the path's chain.
    pub seq: u64,
    pub content_hash: ContentHash,
    pub size: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// The immediately preceding record for the same path.
    pub parent: Option<CommitId>,
}

/// Caller-supplied part of a record; the history fills in position,
/// parent, timestamp and id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordDraft {
    pub path: DatasetPath,
    pub content_hash: ContentHash,
    pub size: u64,
    pub message: String,
}

/// Every field except the id, in a fixed order.
#[derive(Serialize)]
struct RecordPayload<'a> {
    path: &'a DatasetPath,
    seq: u64,
    content_hash: &'a ContentHash,
    size: u64,
    message: &'a str,
    timestamp: &'a DateTime<Utc>,
    parent: Option<&'a CommitId>,
}

impl VersionRecord {
    /// Build a record at `seq` after `parent` and compute its id.
    pub fn seal(
        draft: RecordDraft,
        seq: u64,
        parent: Option<CommitId>,
        timestamp: DateTime<Utc>,
    ) -> HistoryResult<Self> {
        let mut record = Self {
            commit_id: CommitId::from_hash([0; 32]),
            path: draft.path,
            seq,
            content_hash: draft.content_hash,
            size: draft.size,
            message: draft.message,
            timestamp,
            parent,
        };
        record.commit_id = CommitId::from_hash(ContentHasher::RECORD.hash(&record.payload()?));
        Ok(record)
    }

    /// Canonical bytes the commit id is computed from.
    pub fn payload(&self) -> HistoryResult<Vec<u8>> {
        serde_json::to_vec(&RecordPayload {
            path: &self.path,
            seq: self.seq,
            content_hash: &self.content_hash,
            size: self.size,
            message: &self.message,
            timestamp: &self.timestamp,
            parent: self.parent.as_ref(),
        })
        .map_err(|e| HistoryError::Serialization(e.to_string()))
    }

    /// Whether the stored id matches the record's contents.
    pub fn verify_id(&self) -> bool {
        self.payload()
            .map(|p| ContentHasher::RECORD.hash(&p) == *self.commit_id.as_bytes())
            .unwrap_or(false)
    }
}

impl ChainLink for VersionRecord {
    fn link_id(&self) -> [u8; 32] {
        *self.commit_id.as_bytes()
    }

    fn parent_id(&self) -> Option<[u8; 32]> {
        self.parent.map(|p| *p.as_bytes())
    }

    fn seq(&self) -> u64 {
        self.seq
    }

    fn payload_bytes(&self) -> Vec<u8> {
        // An unencodable record yields an empty payload, which fails the id check.
        self.payload().unwrap_or_default()
    }
}
