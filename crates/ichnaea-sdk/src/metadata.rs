use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ichnaea_types::{CommitId, ContentHash, DatasetPath};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("metadata lock poisoned")]
    LockPoisoned,
}

/// Registration of one ingested version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDataset {
    pub name: String,
    pub source_locator: String,
    pub path: DatasetPath,
    pub content_hash: ContentHash,
    pub commit_id: CommitId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Time-ordered (UUID v7).
    pub id: Uuid,
    pub name: String,
    pub source_locator: String,
    pub path: DatasetPath,
    pub content_hash: ContentHash,
    pub commit_id: CommitId,
    pub created_at: DateTime<Utc>,
}

/// Dataset catalogue kept outside the repository.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create(&self, dataset: NewDataset) -> Result<DatasetRecord, MetadataError>;

    async fn get(&self, id: Uuid) -> Result<Option<DatasetRecord>, MetadataError>;

    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<DatasetRecord>, MetadataError>;
}

#[derive(Debug)]
pub struct InMemoryMetadataStore {
    records: RwLock<Vec<DatasetRecord>>,
    available: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MetadataError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MetadataError::Unavailable("in-memory store offline".into()))
        }
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, dataset: NewDataset) -> Result<DatasetRecord, MetadataError> {
        self.check()?;
        let record = DatasetRecord {
            id: Uuid::now_v7(),
            name: dataset.name,
            source_locator: dataset.source_locator,
            path: dataset.path,
            content_hash: dataset.content_hash,
            commit_id: dataset.commit_id,
            created_at: Utc::now(),
        };
        self.records
            .write()
            .map_err(|_| MetadataError::LockPoisoned)?
            .push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<DatasetRecord>, MetadataError> {
        self.check()?;
        let records = self.records.read().map_err(|_| MetadataError::LockPoisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<DatasetRecord>, MetadataError> {
        self.check()?;
        let records = self.records.read().map_err(|_| MetadataError::LockPoisoned)?;
        Ok(records.clone())
    }
}
