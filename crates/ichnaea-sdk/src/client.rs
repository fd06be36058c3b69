use std::path::{Path, PathBuf};
use std::sync::Arc;

use ichnaea_diff::BlobDiff;
use ichnaea_fetch::{FetchOptions, HashingFetcher, Locator, LocatorSource};
use ichnaea_formats::DocumentFormat;
use ichnaea_history::VersionRecord;
use ichnaea_repo::{
    DirectoryReplica, PathTransaction, Replica, Repository, RepositoryError, RepositoryOptions,
    SyncReport,
};
use ichnaea_types::{CommitId, DatasetPath, TypeError};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::IchnaeaConfig;
use crate::coordinator::{DiffRequest, VersionDiff, VersionDiffCoordinator};
use crate::error::{IngestError, SdkError, SdkResult};
use crate::metadata::{DatasetRecord, InMemoryMetadataStore, MetadataStore, NewDataset};
use crate::notary::{AnchorReceipt, AnchorRequest, InMemoryNotary, NotarizeError, Notarizer};
use crate::retry::RetryPolicy;

/// Fetch `locator` and commit it as a new version of dataset `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestRequest {
    pub name: String,
    pub locator: String,
    pub message: Option<String>,
}

impl IngestRequest {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Dataset path for this request: the name itself when it carries an
    /// extension, otherwise the name plus the locator's file extension.
    pub fn dataset_path(&self, locator: &Locator) -> Result<DatasetPath, IngestError> {
        let invalid = |source: TypeError| IngestError::InvalidName {
            name: self.name.clone(),
            source,
        };
        let path = DatasetPath::new(self.name.as_str()).map_err(invalid)?;
        if path.extension().is_some() {
            return Ok(path);
        }
        let ext = locator
            .file_name()
            .and_then(|f| f.rsplit_once('.').map(|(_, ext)| ext.to_string()))
            .filter(|ext| !ext.is_empty());
        match ext {
            Some(ext) => DatasetPath::new(format!("{}.{ext}", self.name)).map_err(invalid),
            None => Ok(path),
        }
    }
}

/// Whether the post-commit push to the replica happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Skipped,
    Synced { report: SyncReport },
    /// The commit stands and stays unsynced; a later `sync` retries it.
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub record: VersionRecord,
    pub dataset: DatasetRecord,
    pub sync: SyncStatus,
}

/// What a diff request names: a registered dataset or a raw path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffTarget {
    Dataset(Uuid),
    Path(DatasetPath),
}

/// Removes the staging file however ingestion ends.
struct StagedFile(PathBuf);

impl StagedFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

pub struct IchnaeaBuilder {
    config: IchnaeaConfig,
    metadata: Option<Arc<dyn MetadataStore>>,
    notary: Option<Arc<dyn Notarizer>>,
    replica: Option<Arc<dyn Replica>>,
    retry: Option<RetryPolicy>,
}

impl IchnaeaBuilder {
    pub fn new(config: IchnaeaConfig) -> Self {
        Self {
            config,
            metadata: None,
            notary: None,
            replica: None,
            retry: None,
        }
    }

    pub fn metadata(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    pub fn notary(mut self, notary: Arc<dyn Notarizer>) -> Self {
        self.notary = Some(notary);
        self
    }

    /// Takes precedence over `sync.replica_dir`.
    pub fn replica(mut self, replica: Arc<dyn Replica>) -> Self {
        self.replica = Some(replica);
        self
    }

    /// Takes precedence over `sync.retry`.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> SdkResult<Ichnaea> {
        let config = self.config;

        let replica = match (self.replica, &config.sync.replica_dir) {
            (Some(replica), _) => Some(replica),
            (None, Some(dir)) => Some(Arc::new(DirectoryReplica::open(dir)?) as Arc<dyn Replica>),
            (None, None) => None,
        };
        let repo = Arc::new(Repository::open(&config.root, RepositoryOptions { replica })?);
        let fetcher = HashingFetcher::new(LocatorSource::new(&config.fetch.user_agent)?);
        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(InMemoryMetadataStore::new()));
        let notary = self.notary.or_else(|| {
            config
                .notarize
                .enabled
                .then(|| Arc::new(InMemoryNotary::new()) as Arc<dyn Notarizer>)
        });
        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::from(&config.sync.retry));

        Ok(Ichnaea {
            coordinator: VersionDiffCoordinator::new(Arc::clone(&repo)),
            config,
            repo,
            fetcher,
            metadata,
            notary,
            retry,
        })
    }
}

/// High-level Ichnaea API.
pub struct Ichnaea {
    config: IchnaeaConfig,
    repo: Arc<Repository>,
    fetcher: HashingFetcher,
    coordinator: VersionDiffCoordinator,
    metadata: Arc<dyn MetadataStore>,
    notary: Option<Arc<dyn Notarizer>>,
    retry: RetryPolicy,
}

impl Ichnaea {
    pub fn builder(config: IchnaeaConfig) -> IchnaeaBuilder {
        IchnaeaBuilder::new(config)
    }

    /// Open with in-memory metadata and, if enabled, an in-memory notary.
    pub fn open(config: IchnaeaConfig) -> SdkResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &IchnaeaConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    // ---- Ingestion ----

    /// Fetch, commit and register one version.
    ///
    /// The fetch streams into a staging file while hashing; the file is then
    /// stored and committed under the dataset path's lock and removed.
    /// Metadata is registered after the commit: if that fails the commit
    /// stands and [`IngestError::Metadata`] carries its id.
    pub async fn ingest(
        &self,
        request: &IngestRequest,
        cancel: &CancellationToken,
    ) -> Result<IngestOutcome, IngestError> {
        let locator = Locator::parse(&request.locator)?;
        let path = request.dataset_path(&locator)?;

        let staging = StagedFile(
            self.config
                .staging_dir()
                .join(Uuid::now_v7().to_string()),
        );
        let options = FetchOptions::with_timeout(self.config.fetch_timeout());
        let fetched = self
            .fetcher
            .fetch_to(&locator, staging.path(), &options, cancel)
            .await?;

        let message = request
            .message
            .clone()
            .unwrap_or_else(|| format!("ingest {} from {locator}", request.name));

        let (record, sync) = {
            let mut tx = self.repo.begin(&path).await?;
            tx.put_file(staging.path(), &fetched.content_hash).await?;
            let record = tx.commit(&message).await?;
            let sync = if self.config.sync.after_commit {
                self.sync_in(&tx, cancel).await
            } else {
                SyncStatus::Skipped
            };
            (record, sync)
        };
        drop(staging);

        let dataset = self
            .metadata
            .create(NewDataset {
                name: request.name.clone(),
                source_locator: locator.to_string(),
                path: path.clone(),
                content_hash: record.content_hash,
                commit_id: record.commit_id,
            })
            .await
            .map_err(|source| IngestError::Metadata {
                commit_id: record.commit_id,
                source,
            })?;

        info!(
            %path,
            dataset = %dataset.id,
            commit = %record.commit_id.short_hex(),
            size = fetched.size,
            "ingest complete"
        );
        Ok(IngestOutcome {
            record,
            dataset,
            sync,
        })
    }

    async fn sync_in(&self, tx: &PathTransaction<'_>, cancel: &CancellationToken) -> SyncStatus {
        match self
            .retry
            .run("sync", || tx.sync(cancel), is_retryable_sync)
            .await
        {
            Ok(report) => SyncStatus::Synced { report },
            Err(e) => {
                warn!(path = %tx.path(), error = %e, "post-commit sync failed; commits kept unsynced");
                SyncStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Push unsynced versions of `path`, retrying transient failures.
    pub async fn sync(&self, path: &DatasetPath, cancel: &CancellationToken) -> SdkResult<SyncReport> {
        Ok(self
            .retry
            .run("sync", || self.repo.sync(path, cancel), is_retryable_sync)
            .await?)
    }

    pub async fn datasets(&self) -> SdkResult<Vec<DatasetRecord>> {
        Ok(self.metadata.list().await?)
    }

    // ---- Diffs ----

    /// Format-aware diff between two versions. `format` defaults to the
    /// path's extension.
    pub async fn diff(
        &self,
        target: DiffTarget,
        commit_a: CommitId,
        commit_b: CommitId,
        format: Option<DocumentFormat>,
    ) -> SdkResult<VersionDiff> {
        let path = self.target_path(target).await?;
        let mut request = DiffRequest::new(path, commit_a, commit_b);
        request.format = format;
        Ok(self.coordinator.diff(&request).await?)
    }

    /// Line hunks between the raw bytes of two versions.
    pub async fn raw_diff(
        &self,
        target: DiffTarget,
        commit_a: CommitId,
        commit_b: CommitId,
    ) -> SdkResult<BlobDiff> {
        let path = self.target_path(target).await?;
        Ok(self.repo.diff(&commit_a, &commit_b, &path).await?)
    }

    async fn target_path(&self, target: DiffTarget) -> SdkResult<DatasetPath> {
        match target {
            DiffTarget::Path(path) => Ok(path),
            DiffTarget::Dataset(id) => self
                .metadata
                .get(id)
                .await?
                .map(|dataset| dataset.path)
                .ok_or(SdkError::UnknownDataset(id)),
        }
    }

    // ---- Notarization ----

    /// Anchor a committed version with the notary. Independent of the
    /// commit: a failure here never affects repository state.
    pub async fn notarize(&self, record: &VersionRecord) -> Result<AnchorReceipt, NotarizeError> {
        let notary = self.notary.as_ref().ok_or(NotarizeError::NotConfigured)?;
        anchor_with_retry(notary.as_ref(), &self.retry, anchor_request(record)).await
    }

    /// Run [`notarize`](Self::notarize) in the background. Failures are
    /// logged and yield `None`. Returns `None` without a notary.
    pub fn spawn_notarization(
        &self,
        record: &VersionRecord,
    ) -> Option<JoinHandle<Option<AnchorReceipt>>> {
        let notary = Arc::clone(self.notary.as_ref()?);
        let retry = self.retry.clone();
        let request = anchor_request(record);
        Some(tokio::spawn(async move {
            let commit = request.commit_id;
            match anchor_with_retry(notary.as_ref(), &retry, request).await {
                Ok(receipt) => {
                    info!(commit = %commit.short_hex(), receipt = %receipt.receipt_id, "version notarized");
                    Some(receipt)
                }
                Err(e) => {
                    warn!(commit = %commit.short_hex(), error = %e, "notarization failed");
                    None
                }
            }
        }))
    }
}

fn is_retryable_sync(error: &RepositoryError) -> bool {
    matches!(error, RepositoryError::SyncFailed { source, .. } if source.is_retryable())
}

fn anchor_request(record: &VersionRecord) -> AnchorRequest {
    AnchorRequest {
        content_hash: record.content_hash,
        file_name: record.path.file_name().to_string(),
        commit_id: record.commit_id,
    }
}

async fn anchor_with_retry(
    notary: &dyn Notarizer,
    retry: &RetryPolicy,
    request: AnchorRequest,
) -> Result<AnchorReceipt, NotarizeError> {
    retry
        .run(
            "notarize",
            || notary.anchor(request.clone()),
            NotarizeError::is_retryable,
        )
        .await
}
