use std::fmt;
use std::sync::Arc;

use ichnaea_diff::{diff_texts, StructuralDiff};
use ichnaea_formats::{canonicalize, parse, DocumentFormat, ParseError, UnsupportedFormat};
use ichnaea_repo::{Repository, ResolveError};
use ichnaea_types::{CommitId, DatasetPath};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Pipeline position of a format-aware diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffStage {
    Start,
    ResolveA,
    ResolveB,
    ParseA,
    ParseB,
    Canonicalize,
    Diff,
    Done,
}

impl fmt::Display for DiffStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiffStage::Start => "start",
            DiffStage::ResolveA => "resolve-a",
            DiffStage::ResolveB => "resolve-b",
            DiffStage::ParseA => "parse-a",
            DiffStage::ParseB => "parse-b",
            DiffStage::Canonicalize => "canonicalize",
            DiffStage::Diff => "diff",
            DiffStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiffFailureKind {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// First failure of a diff pipeline.
#[derive(Debug)]
pub struct DiffFailure {
    pub stage: DiffStage,
    /// Which version the failing stage was working on, if any.
    pub side: Option<Side>,
    pub kind: DiffFailureKind,
}

impl DiffFailure {
    fn new(stage: DiffStage, side: Option<Side>, kind: impl Into<DiffFailureKind>) -> Self {
        Self {
            stage,
            side,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for DiffFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "diff failed at {} (side {side}): {}", self.stage, self.kind),
            None => write!(f, "diff failed at {}: {}", self.stage, self.kind),
        }
    }
}

impl std::error::Error for DiffFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffRequest {
    pub path: DatasetPath,
    pub commit_a: CommitId,
    pub commit_b: CommitId,
    /// Overrides the format implied by the path's extension.
    pub format: Option<DocumentFormat>,
}

impl DiffRequest {
    pub fn new(path: DatasetPath, commit_a: CommitId, commit_b: CommitId) -> Self {
        Self {
            path,
            commit_a,
            commit_b,
            format: None,
        }
    }

    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn effective_format(&self) -> Result<DocumentFormat, UnsupportedFormat> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let ext = self
            .path
            .extension()
            .ok_or_else(|| UnsupportedFormat(self.path.to_string()))?;
        DocumentFormat::from_extension(&ext)
    }
}

/// Result of a successful format-aware diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    pub path: DatasetPath,
    pub format: DocumentFormat,
    pub commit_a: CommitId,
    pub commit_b: CommitId,
    pub diff: StructuralDiff,
}

/// Drives resolve, parse, canonicalize and diff for two versions of a path.
///
/// Both versions are resolved before either is parsed, and side A is
/// parsed before side B; the first failure ends the pipeline.
#[derive(Clone)]
pub struct VersionDiffCoordinator {
    repo: Arc<Repository>,
}

impl VersionDiffCoordinator {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn diff(&self, request: &DiffRequest) -> Result<VersionDiff, DiffFailure> {
        let path = &request.path;
        debug!(%path, stage = %DiffStage::Start, "diff stage");
        let format = request
            .effective_format()
            .map_err(|e| DiffFailure::new(DiffStage::Start, None, e))?;

        debug!(%path, stage = %DiffStage::ResolveA, "diff stage");
        let old = self
            .repo
            .resolve(&request.commit_a, path)
            .await
            .map_err(|e| DiffFailure::new(DiffStage::ResolveA, Some(Side::A), e))?;

        debug!(%path, stage = %DiffStage::ResolveB, "diff stage");
        let new = self
            .repo
            .resolve(&request.commit_b, path)
            .await
            .map_err(|e| DiffFailure::new(DiffStage::ResolveB, Some(Side::B), e))?;

        let diff = tokio::task::spawn_blocking(move || compare(format, &old, &new))
            .await
            .map_err(|e| DiffFailure::new(DiffStage::Diff, None, DiffFailureKind::Task(e.to_string())))??;

        info!(
            %path,
            %format,
            a = %request.commit_a.short_hex(),
            b = %request.commit_b.short_hex(),
            added = diff.additions(),
            removed = diff.removals(),
            "diff complete"
        );
        Ok(VersionDiff {
            path: path.clone(),
            format,
            commit_a: request.commit_a,
            commit_b: request.commit_b,
            diff,
        })
    }
}

fn compare(format: DocumentFormat, old: &[u8], new: &[u8]) -> Result<StructuralDiff, DiffFailure> {
    debug!(stage = %DiffStage::ParseA, %format, "diff stage");
    let doc_a = parse(format, old).map_err(|e| DiffFailure::new(DiffStage::ParseA, Some(Side::A), e))?;

    debug!(stage = %DiffStage::ParseB, %format, "diff stage");
    let doc_b = parse(format, new).map_err(|e| DiffFailure::new(DiffStage::ParseB, Some(Side::B), e))?;

    debug!(stage = %DiffStage::Canonicalize, "diff stage");
    let text_a = canonicalize(&doc_a);
    let text_b = canonicalize(&doc_b);

    debug!(stage = %DiffStage::Diff, "diff stage");
    let diff = diff_texts(&text_a, &text_b);
    debug!(stage = %DiffStage::Done, segments = diff.segments().len(), "diff stage");
    Ok(diff)
}
