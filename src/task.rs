//! One copy run, end to end.
//!
//! Files are resolved locally before any connection is made. The remote side
//! then runs in strict phases: optional clean, sequential directory creation,
//! and finally the upload queue. Any failure before the queue starts is fatal;
//! failures inside the queue are collected per file.

use std::sync::Arc;

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, info, warn};

use crate::config::CopyTaskConfig;
use crate::error::CopyError;
use crate::planner;
use crate::remote::RemoteSession;
use crate::resolve::{self, is_rooted, normalize_remote_path, ResolveOptions};
use crate::transfer::{TaskOutcome, TransferQueue, TransferReporter, UploadJob};

/// Jobs and remote directories derived from the local source tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPlan {
    pub jobs: Vec<UploadJob>,
    pub directories: Vec<String>,
}

impl CopyPlan {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Resolve the configured patterns and plan the remote directories.
///
/// An empty match is only an error when `fail_on_empty_source` is set.
pub fn build_plan(config: &CopyTaskConfig) -> Result<CopyPlan> {
    let source = config.source_path();
    let options = ResolveOptions::new(&config.target_folder, config.flatten_folders);
    let jobs = resolve::resolve(&source, &config.contents, &options)?;

    if jobs.is_empty() {
        if config.fail_on_empty_source {
            return Err(CopyError::EmptySource { folder: source }.into());
        }
        warn!("No files matched {:?} in {}", config.contents, source.display());
    } else {
        info!("Resolved {} files from {}", jobs.len(), source.display());
    }

    let directories = planner::plan_for_jobs(&jobs);
    debug!("Planned {} remote directories", directories.len());

    Ok(CopyPlan { jobs, directories })
}

/// Shell command that empties `target_folder` on the remote host.
///
/// Refuses empty, relative-current and root folders.
pub fn clean_command(target_folder: &str, windows: bool, include_hidden: bool) -> Result<String, CopyError> {
    let folder = normalize_remote_path(target_folder.trim());
    if target_folder.trim().is_empty() || folder == "." || is_root(&folder) {
        return Err(CopyError::InvalidCleanTarget {
            folder: target_folder.to_string(),
        });
    }

    if windows {
        let force = if include_hidden { " -Force" } else { "" };
        let path = folder.replace('\'', "''");
        let script = format!(
            "Get-ChildItem -LiteralPath '{}'{} | Remove-Item -Recurse -Force",
            path, force
        );
        Ok(format!(
            "powershell -NoProfile -NonInteractive -EncodedCommand {}",
            encode_powershell(&script)
        ))
    } else {
        let quoted = shell_quote(&folder);
        let mut command = format!("rm -rf {}/*", quoted);
        if include_hidden {
            command.push_str(&format!(" {}/.[!.]* {}/..?*", quoted, quoted));
        }
        Ok(command)
    }
}

fn is_root(folder: &str) -> bool {
    is_rooted(folder) && (matches!(folder, "/" | "//") || (folder.len() == 3 && folder.ends_with(":/")))
}

/// Base64 of the UTF-16LE script, as `-EncodedCommand` expects.
///
/// The encoded form survives any remote shell quoting.
fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(utf16)
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A resolved copy run, ready to execute against a session.
pub struct CopyTask {
    config: CopyTaskConfig,
    plan: CopyPlan,
}

impl CopyTask {
    /// Resolve the sources for `config`; nothing remote happens yet.
    pub fn prepare(config: CopyTaskConfig) -> Result<Self> {
        let plan = build_plan(&config)?;
        Ok(Self { config, plan })
    }

    pub fn plan(&self) -> &CopyPlan {
        &self.plan
    }

    pub fn config(&self) -> &CopyTaskConfig {
        &self.config
    }

    /// Whether running this task has to touch the remote host at all
    pub fn needs_session(&self) -> bool {
        !self.plan.is_empty() || self.config.clean_target_folder
    }

    /// Execute against `session`, closing it afterwards whatever happens.
    pub async fn run<S: RemoteSession>(&self, session: Arc<S>) -> Result<TaskOutcome> {
        let result = self.run_phases(Arc::clone(&session)).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close remote session: {:#}", e);
        }

        result
    }

    async fn run_phases<S: RemoteSession>(&self, session: Arc<S>) -> Result<TaskOutcome> {
        if self.config.clean_target_folder {
            self.clean_target(session.as_ref()).await?;
        }

        if self.plan.is_empty() {
            return Ok(TaskOutcome::success(0, "No files matched; nothing to copy"));
        }

        for directory in &self.plan.directories {
            debug!("Creating remote directory {}", directory);
            session
                .create_directory(directory)
                .await
                .map_err(|source| CopyError::DirectoryCreation {
                    directory: directory.clone(),
                    source,
                })?;
        }

        let queue_config = self.config.queue_config();
        info!(
            "Copying {} files with {} concurrent uploads",
            self.plan.jobs.len(),
            queue_config.concurrency
        );

        let (queue, events) = TransferQueue::new(session, queue_config, self.config.overwrite);
        queue.enqueue(self.plan.jobs.clone())?;

        let (stats, outcome) = tokio::join!(queue.run(), TransferReporter::new().consume(events));
        debug!("Peak concurrent uploads: {}", stats.peak_active);

        Ok(outcome)
    }

    async fn clean_target<S: RemoteSession + ?Sized>(&self, session: &S) -> Result<()> {
        let command = clean_command(
            &self.config.target_folder,
            self.config.is_windows_on_target,
            self.config.clean_hidden_files_in_target,
        )?;

        info!("Cleaning target folder {}", self.config.target_folder);
        let output = session
            .run_command(&command)
            .await
            .map_err(|source| CopyError::CleanTarget {
                folder: self.config.target_folder.clone(),
                source,
            })?;

        if !output.stderr.trim().is_empty() {
            debug!("Clean command stderr: {}", output.stderr.trim());
        }
        Ok(())
    }
}
