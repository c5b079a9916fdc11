//! Error taxonomy for a copy run.
//!
//! Task-level failures ([`CopyError`]) stop the run before any upload is
//! dispatched. Per-file failures ([`JobError`]) are collected by the reporter
//! and never stop sibling uploads.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors that abort the whole copy task.
#[derive(Debug, Error)]
pub enum CopyError {
    /// The source folder is missing or not a directory.
    #[error("source folder {path} is not accessible: {reason}")]
    SourceFolder { path: PathBuf, reason: String },

    /// No file matched and the task was configured to fail in that case.
    #[error("no files matched the given patterns in {folder}")]
    EmptySource { folder: PathBuf },

    /// Cleaning was requested for a target folder that must not be wiped.
    #[error("refusing to clean target folder '{folder}'")]
    InvalidCleanTarget { folder: String },

    /// The remote clean command failed.
    #[error("failed to clean target folder {folder}: {source:#}")]
    CleanTarget {
        folder: String,
        #[source]
        source: anyhow::Error,
    },

    /// A remote directory could not be created.
    #[error("failed to create remote directory {directory}: {source:#}")]
    DirectoryCreation {
        directory: String,
        #[source]
        source: anyhow::Error,
    },

    /// The SSH connection could not be opened.
    #[error("failed to connect to {endpoint}: {source:#}")]
    Connection {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure of a single upload job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Overwrite is disabled and the target already exists.
    #[error("target file {target} already exists")]
    ExistenceConflict { target: String },

    /// The existence check or the upload primitive failed.
    #[error("{message}")]
    Transfer { target: String, message: String },
}

impl JobError {
    /// Wrap a transport error for the given target.
    pub fn transfer(target: &str, err: &anyhow::Error) -> Self {
        JobError::Transfer {
            target: target.to_string(),
            message: format!("{:#}", err),
        }
    }

    /// Remote path the failing job was writing to.
    pub fn target(&self) -> &str {
        match self {
            JobError::ExistenceConflict { target } => target,
            JobError::Transfer { target, .. } => target,
        }
    }
}
