use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::transfer::{TaskOutcome, TaskStatus};

/// Identity and timing of one copy run.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub hostname: String,
    pub endpoint: String,
    pub source_folder: String,
    pub target_folder: String,
    pub started_at: DateTime<Utc>,
}

impl RunInfo {
    /// Start a run record for the local host, timestamped now.
    pub fn start(endpoint: &str, source_folder: &str, target_folder: &str) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            run_id: Uuid::new_v4(),
            hostname,
            endpoint: endpoint.to_string(),
            source_folder: source_folder.to_string(),
            target_folder: target_folder.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Create a JSON summary of a finished copy run.
///
/// # Example Output
///
/// ```json
/// {
///   "run_id": "550e8400-e29b-41d4-a716-446655440000",
///   "hostname": "build-agent-07",
///   "endpoint": "deploy@files.example.com:22",
///   "status": "Failed",
///   "succeeded": 41,
///   "failed": 1,
///   "failures": [{"source": "...", "target": "...", "error": "..."}]
/// }
/// ```
pub fn create_run_summary(info: &RunInfo, outcome: &TaskOutcome, finished_at: DateTime<Utc>) -> Result<String> {
    let failures: Vec<_> = outcome
        .failures
        .iter()
        .map(|failed| {
            json!({
                "source": failed.job.source().to_string_lossy(),
                "target": failed.target(),
                "error": failed.error.to_string(),
            })
        })
        .collect();

    let duration_ms = (finished_at - info.started_at).num_milliseconds().max(0);

    let summary = json!({
        "run_id": info.run_id.to_string(),
        "hostname": info.hostname,
        "endpoint": info.endpoint,
        "source_folder": info.source_folder,
        "target_folder": info.target_folder,
        "started_at": info.started_at.to_rfc3339(),
        "finished_at": finished_at.to_rfc3339(),
        "duration_ms": duration_ms,
        "tool_version": env!("CARGO_PKG_VERSION"),
        "status": outcome.status,
        "succeeded": outcome.succeeded,
        "failed": outcome.failures.len(),
        "summary": outcome.summary,
        "failures": failures,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")
}

/// Write the run summary to `path`.
pub fn write_run_summary(path: &Path, info: &RunInfo, outcome: &TaskOutcome) -> Result<()> {
    let content = create_run_summary(info, outcome, Utc::now())?;
    fs::write(path, content).context(format!("Failed to write run summary to {}", path.display()))?;

    let verdict = match outcome.status {
        TaskStatus::Succeeded => "succeeded",
        TaskStatus::Failed => "failed",
    };
    info!("Run {} {}; summary written to {}", info.run_id, verdict, path.display());
    Ok(())
}
