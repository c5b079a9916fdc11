//! # ssh-copy
//!
//! Copy build artifacts to a remote host over SSH with a bounded-concurrency
//! upload queue.
//!
//! ## Overview
//!
//! A copy run resolves glob patterns against a local source folder, maps each
//! match to a remote path, creates the remote directories, and then uploads
//! the files through a [`transfer::TransferQueue`] that keeps a fixed number
//! of uploads in flight. Per-file failures are collected and decide the final
//! verdict; they never stop sibling uploads.
//!
//! ## Features
//!
//! - **Glob patterns with excludes**: `**`, basename matching, `!` negation
//! - **Bounded concurrency**: configurable in-flight limit and dispatch delay
//! - **Overwrite control**: optional per-file existence check
//! - **Target cleaning**: Linux and Windows remote hosts
//! - **JSON run summary**: run id, timings and failure list
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ssh_copy::config::CopyTaskConfig;
//! use ssh_copy::remote::ssh::SshSession;
//! use ssh_copy::task::CopyTask;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CopyTaskConfig::from_yaml_file(std::path::Path::new("ssh-copy.yaml"))?;
//! let task = CopyTask::prepare(config)?;
//!
//! let concurrency = task.config().queue_config().concurrency;
//! let session = SshSession::connect(task.config().endpoint.clone(), concurrency).await?;
//! let outcome = task.run(Arc::new(session)).await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`resolve`]: pattern matching and remote path mapping
//! - [`planner`]: remote directory planning
//! - [`transfer`]: upload queue and outcome reporting
//! - [`remote`]: remote session trait and the SSH implementation
//! - [`task`]: orchestration of one copy run
//! - [`config`]: YAML configuration and environment expansion
//! - [`security`]: credential scrubbing

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Configuration loading and validation
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Task-level and per-file error types
pub mod error;

/// Remote directory planning
pub mod planner;

/// Remote session abstraction and SSH implementation
pub mod remote;

/// Pattern resolution and target path mapping
pub mod resolve;

/// Security utilities for credential protection
pub mod security;

/// Orchestration of a copy run
pub mod task;

/// Upload queue and reporting
pub mod transfer;

/// Run summary generation
pub mod utils;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
