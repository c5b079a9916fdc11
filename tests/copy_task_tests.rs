//! Integration tests for a full copy run against a mocked remote host.
//!
//! The remote side is a `mockall` mock of `RemoteSession`, so these tests
//! exercise the real resolver, planner, queue and reporter end to end.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mockall::mock;
use tempfile::TempDir;

use ssh_copy::config::{CopyTaskConfig, NumericInput};
use ssh_copy::error::{CopyError, JobError};
use ssh_copy::remote::{CommandOutput, RemoteSession};
use ssh_copy::task::CopyTask;
use ssh_copy::transfer::TaskStatus;

mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteSession for Remote {
        async fn check_exists(&self, path: &str) -> Result<bool>;
        async fn create_directory(&self, path: &str) -> Result<()>;
        async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;
        async fn run_command(&self, command: &str) -> Result<CommandOutput>;
        async fn close(&self) -> Result<()>;
    }
}

fn source_tree(files: &[&str]) -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    for file in files {
        let path = temp_dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, b"payload")?;
    }
    Ok(temp_dir)
}

fn config_for(source: &Path, target: &str) -> CopyTaskConfig {
    CopyTaskConfig {
        source_folder: source.to_string_lossy().into_owned(),
        target_folder: target.to_string(),
        delay_between_uploads: Some(NumericInput::Number(0)),
        ..CopyTaskConfig::default()
    }
}

#[tokio::test]
async fn test_directory_failure_aborts_before_any_upload() -> Result<()> {
    let temp_dir = source_tree(&["a/one.txt", "b/two.txt"])?;
    let task = CopyTask::prepare(config_for(temp_dir.path(), "/srv/out"))?;

    let mut remote = MockRemote::new();
    remote
        .expect_create_directory()
        .withf(|path| path.ends_with("/a"))
        .times(1)
        .returning(|_| Ok(()));
    remote
        .expect_create_directory()
        .withf(|path| path.ends_with("/b"))
        .times(1)
        .returning(|_| Err(anyhow!("Permission denied")));
    remote.expect_upload_file().never();
    remote.expect_check_exists().never();
    remote.expect_close().times(1).returning(|| Ok(()));

    let err = task.run(Arc::new(remote)).await.unwrap_err();
    match err.downcast_ref::<CopyError>() {
        Some(CopyError::DirectoryCreation { directory, .. }) => assert_eq!(directory, "/srv/out/b"),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_existing_target_fails_one_job_of_five() -> Result<()> {
    let temp_dir = source_tree(&["f1.bin", "f2.bin", "f3.bin", "f4.bin", "f5.bin"])?;
    let mut config = config_for(temp_dir.path(), "/drop");
    config.overwrite = false;
    config.concurrent_uploads = Some(NumericInput::Number(2));
    let task = CopyTask::prepare(config)?;

    let uploads = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));

    let mut remote = MockRemote::new();
    remote.expect_create_directory().returning(|_| Ok(()));
    remote
        .expect_check_exists()
        .returning(|path| Ok(path == "/drop/f3.bin"));
    let recorded = Arc::clone(&uploads);
    remote.expect_upload_file().returning(move |_, remote| {
        recorded.lock().unwrap().push(remote.to_string());
        Ok(())
    });
    let closed = Arc::clone(&closes);
    remote.expect_close().returning(move || {
        closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let outcome = task.run(Arc::new(remote)).await?;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.succeeded, 4);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].target(), "/drop/f3.bin");
    assert!(matches!(outcome.failures[0].error, JobError::ExistenceConflict { .. }));

    let mut uploaded = uploads.lock().unwrap().clone();
    uploaded.sort();
    assert_eq!(uploaded, vec!["/drop/f1.bin", "/drop/f2.bin", "/drop/f4.bin", "/drop/f5.bin"]);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_upload_errors_are_reported_per_file() -> Result<()> {
    let temp_dir = source_tree(&["ok.txt", "broken.txt"])?;
    let task = CopyTask::prepare(config_for(temp_dir.path(), "/srv"))?;

    let mut remote = MockRemote::new();
    remote.expect_create_directory().returning(|_| Ok(()));
    remote.expect_check_exists().never();
    remote.expect_upload_file().returning(|_, remote| {
        if remote.ends_with("broken.txt") {
            Err(anyhow!("SFTP write failed: channel closed"))
        } else {
            Ok(())
        }
    });
    remote.expect_close().returning(|| Ok(()));

    let outcome = task.run(Arc::new(remote)).await?;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(
        outcome.failure_lines(),
        vec![format!(
            "{}: SFTP write failed: channel closed",
            temp_dir.path().join("broken.txt").display()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_clean_command_runs_first() -> Result<()> {
    let temp_dir = source_tree(&["index.html"])?;
    let mut config = config_for(temp_dir.path(), "/var/www");
    config.clean_target_folder = true;
    let task = CopyTask::prepare(config)?;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut remote = MockRemote::new();

    let seen = Arc::clone(&order);
    remote
        .expect_run_command()
        .withf(|command| command.to_string() == "rm -rf '/var/www'/*")
        .times(1)
        .returning(move |_| {
            seen.lock().unwrap().push("clean");
            Ok(CommandOutput::default())
        });
    let seen = Arc::clone(&order);
    remote.expect_create_directory().returning(move |_| {
        seen.lock().unwrap().push("mkdir");
        Ok(())
    });
    let seen = Arc::clone(&order);
    remote.expect_upload_file().returning(move |_, _| {
        seen.lock().unwrap().push("upload");
        Ok(())
    });
    remote.expect_close().returning(|| Ok(()));

    let outcome = task.run(Arc::new(remote)).await?;

    assert!(outcome.is_success());
    assert_eq!(*order.lock().unwrap(), vec!["clean", "mkdir", "upload"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_source_fails_before_connecting() -> Result<()> {
    let temp_dir = source_tree(&["notes.md"])?;
    let mut config = config_for(temp_dir.path(), "/srv");
    config.contents = vec!["*.exe".to_string()];
    config.fail_on_empty_source = true;

    let err = match CopyTask::prepare(config) {
        Ok(_) => panic!("expected an empty source error"),
        Err(e) => e,
    };
    assert!(matches!(err.downcast_ref::<CopyError>(), Some(CopyError::EmptySource { .. })));
    Ok(())
}
