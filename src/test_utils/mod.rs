//! Test utilities for ssh_copy
//!
//! Temporary source trees and an in-memory [`RemoteSession`] that records
//! what the pipeline asked of it.

#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::remote::{CommandOutput, RemoteSession};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file structure in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;

    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

#[derive(Default)]
struct FakeState {
    existing: HashSet<String>,
    failing_uploads: HashSet<String>,
    failing_directories: HashSet<String>,
    failing_commands: bool,
    latency: HashMap<String, Duration>,
    started: Vec<(String, Instant)>,
    uploaded: Vec<String>,
    directories: Vec<String>,
    commands: Vec<String>,
    exists_checks: usize,
    in_flight: usize,
    peak_in_flight: usize,
    closed: usize,
}

/// In-memory remote host.
///
/// Uploads succeed unless the target was registered with
/// [`fail_upload`](Self::fail_upload); per-target latency is simulated with
/// `tokio::time::sleep`, so paused-clock tests stay deterministic.
#[derive(Default)]
pub struct FakeSession {
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a remote path as already present
    pub fn add_existing(&self, target: &str) {
        self.lock().existing.insert(target.to_string());
    }

    pub fn fail_upload(&self, target: &str) {
        self.lock().failing_uploads.insert(target.to_string());
    }

    pub fn fail_directory(&self, directory: &str) {
        self.lock().failing_directories.insert(directory.to_string());
    }

    pub fn fail_commands(&self) {
        self.lock().failing_commands = true;
    }

    pub fn set_latency(&self, target: &str, latency: Duration) {
        self.lock().latency.insert(target.to_string(), latency);
    }

    /// Targets in the order their uploads started
    pub fn started(&self) -> Vec<String> {
        self.lock().started.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.lock().started.iter().map(|(_, at)| *at).collect()
    }

    /// Targets whose upload completed, in completion order
    pub fn uploaded(&self) -> Vec<String> {
        self.lock().uploaded.clone()
    }

    pub fn directories(&self) -> Vec<String> {
        self.lock().directories.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn exists_checks(&self) -> usize {
        self.lock().exists_checks
    }

    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_in_flight
    }

    pub fn close_count(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn check_exists(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.exists_checks += 1;
        Ok(state.existing.contains(path) || state.uploaded.iter().any(|u| u == path))
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing_directories.contains(path) {
            return Err(anyhow!("Permission denied: {}", path));
        }
        state.directories.push(path.to_string());
        Ok(())
    }

    async fn upload_file(&self, _local: &Path, remote: &str) -> Result<()> {
        let latency = {
            let mut state = self.lock();
            state.started.push((remote.to_string(), Instant::now()));
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            state.latency.get(remote).copied()
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.in_flight -= 1;
        if state.failing_uploads.contains(remote) {
            return Err(anyhow!("simulated transfer failure for {}", remote));
        }
        state.uploaded.push(remote.to_string());
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let mut state = self.lock();
        state.commands.push(command.to_string());
        if state.failing_commands {
            return Err(anyhow!("Remote command exited with status 1: permission denied"));
        }
        Ok(CommandOutput::default())
    }

    async fn close(&self) -> Result<()> {
        self.lock().closed += 1;
        Ok(())
    }
}
