use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// One file transfer: a local source and its remote destination.
///
/// A job is identified by its target path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadJob {
    source: PathBuf,
    target: String,
}

impl UploadJob {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Absolute local path
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Normalized remote path
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for UploadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.display(), self.target)
    }
}

/// A job that reached the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTransfer {
    pub job: UploadJob,
    pub error: JobError,
}

impl FailedTransfer {
    pub fn new(job: UploadJob, error: JobError) -> Self {
        Self { job, error }
    }

    /// Remote path of the failed upload
    pub fn target(&self) -> &str {
        self.job.target()
    }
}

impl fmt::Display for FailedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.job.source().display(), self.error)
    }
}

/// Terminal result of a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded(UploadJob),
    Failed(FailedTransfer),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Succeeded(_))
    }
}
