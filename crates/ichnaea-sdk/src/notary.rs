use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ichnaea_types::{CommitId, ContentHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotarizeError {
    #[error("no notary configured")]
    NotConfigured,

    #[error("notary unavailable: {0}")]
    Unavailable(String),

    #[error("notary rejected the request: {0}")]
    Rejected(String),

    #[error("notary lock poisoned")]
    LockPoisoned,
}

impl NotarizeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotarizeError::Unavailable(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub content_hash: ContentHash,
    pub file_name: String,
    pub commit_id: CommitId,
}

/// Proof that a content hash was anchored by the notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub receipt_id: Uuid,
    pub content_hash: ContentHash,
    pub commit_id: CommitId,
    pub anchored_at: DateTime<Utc>,
}

/// External timestamping service.
#[async_trait]
pub trait Notarizer: Send + Sync {
    async fn anchor(&self, request: AnchorRequest) -> Result<AnchorReceipt, NotarizeError>;
}

#[derive(Debug)]
pub struct InMemoryNotary {
    receipts: RwLock<Vec<AnchorReceipt>>,
    online: AtomicBool,
}

impl InMemoryNotary {
    pub fn new() -> Self {
        Self {
            receipts: RwLock::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn receipts(&self) -> Result<Vec<AnchorReceipt>, NotarizeError> {
        Ok(self
            .receipts
            .read()
            .map_err(|_| NotarizeError::LockPoisoned)?
            .clone())
    }
}

impl Default for InMemoryNotary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notarizer for InMemoryNotary {
    async fn anchor(&self, request: AnchorRequest) -> Result<AnchorReceipt, NotarizeError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(NotarizeError::Unavailable("in-memory notary offline".into()));
        }
        if request.file_name.is_empty() {
            return Err(NotarizeError::Rejected("empty file name".into()));
        }
        let receipt = AnchorReceipt {
            receipt_id: Uuid::now_v7(),
            content_hash: request.content_hash,
            commit_id: request.commit_id,
            anchored_at: Utc::now(),
        };
        self.receipts
            .write()
            .map_err(|_| NotarizeError::LockPoisoned)?
            .push(receipt.clone());
        Ok(receipt)
    }
}
