use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// One unit of work: move `source` into the category tree under `base_dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub base_dir: PathBuf,
    pub source: PathBuf,
}

impl FileTask {
    pub fn new(base_dir: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            source: source.into(),
        }
    }
}

/// Failure taxonomy for a single relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Other,
}

impl FailureKind {
    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => FailureKind::NotFound,
            io::ErrorKind::AlreadyExists => FailureKind::AlreadyExists,
            io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            _ => FailureKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not found",
            FailureKind::AlreadyExists => "already exists",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::Other => "error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a relocation did not happen
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {detail}")]
pub struct RelocationFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl RelocationFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Classify an IO error, keeping its message and the path it concerns
    pub fn from_io(operation: &str, path: &Path, err: &io::Error) -> Self {
        Self::new(
            FailureKind::from_io(err.kind()),
            format!("{operation} {}: {err}", path.display()),
        )
    }
}

/// Result of one relocation task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelocationOutcome {
    Success { destination: PathBuf },
    Failure(RelocationFailure),
}

impl RelocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RelocationOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RelocationOutcome::Success { .. } => None,
            RelocationOutcome::Failure(failure) => Some(failure.kind),
        }
    }
}

impl From<Result<PathBuf, RelocationFailure>> for RelocationOutcome {
    fn from(result: Result<PathBuf, RelocationFailure>) -> Self {
        match result {
            Ok(destination) => RelocationOutcome::Success { destination },
            Err(failure) => RelocationOutcome::Failure(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocatedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub source: PathBuf,
    #[serde(flatten)]
    pub failure: RelocationFailure,
}

/// Aggregate verdict over every outcome of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub status: BatchStatus,
    pub dry_run: bool,
    pub relocated: Vec<RelocatedFile>,
    pub failures: Vec<FailedFile>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl BatchResult {
    /// Build the verdict from `(source, outcome)` pairs in any order
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = (PathBuf, RelocationOutcome)>,
        dry_run: bool,
        elapsed: Duration,
    ) -> Self {
        let mut relocated = Vec::new();
        let mut failures = Vec::new();

        for (source, outcome) in outcomes {
            match outcome {
                RelocationOutcome::Success { destination } => {
                    relocated.push(RelocatedFile { source, destination })
                }
                RelocationOutcome::Failure(failure) => {
                    failures.push(FailedFile { source, failure })
                }
            }
        }

        relocated.sort_by(|a, b| a.source.cmp(&b.source));
        failures.sort_by(|a, b| a.source.cmp(&b.source));

        let status = if failures.is_empty() {
            BatchStatus::Success
        } else {
            BatchStatus::Failure
        };

        Self {
            status,
            dry_run,
            relocated,
            failures,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }

    /// Number of outcomes (equals the number of input files)
    pub fn total(&self) -> usize {
        self.relocated.len() + self.failures.len()
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &FailedFile> {
        self.failures.iter().filter(move |f| f.failure.kind == kind)
    }
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
