use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::transfer::job::FailedTransfer;
use crate::transfer::queue::QueueEvent;

/// Final verdict of a copy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

/// What a copy run reports upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub succeeded: usize,
    pub failures: Vec<FailedTransfer>,
    /// One-line human readable summary
    pub summary: String,
}

impl TaskOutcome {
    /// A run that finished without failures
    pub fn success(succeeded: usize, summary: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            succeeded,
            failures: Vec::new(),
            summary: summary.into(),
        }
    }

    /// A run that stopped on a fatal error before or instead of transferring
    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            succeeded: 0,
            failures: Vec::new(),
            summary: summary.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    /// One line per failed file
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.to_string()).collect()
    }
}

/// Aggregates queue events into a [`TaskOutcome`].
///
/// Failures are kept in arrival order, which is completion order rather
/// than dispatch order.
#[derive(Debug, Default)]
pub struct TransferReporter {
    succeeded: usize,
    failures: Vec<FailedTransfer>,
}

impl TransferReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event; returns the outcome once `End` arrives.
    pub fn record(&mut self, event: QueueEvent) -> Option<TaskOutcome> {
        match event {
            QueueEvent::Processed(_) => {
                self.succeeded += 1;
                None
            }
            QueueEvent::Error(failed) => {
                error!("Failed to copy {}", failed);
                self.failures.push(failed);
                None
            }
            QueueEvent::Empty => None,
            QueueEvent::End(_) => Some(self.outcome()),
        }
    }

    /// Consume the event stream until `End`.
    ///
    /// A stream that closes without `End` is reported as a failed run.
    pub async fn consume(mut self, mut events: mpsc::UnboundedReceiver<QueueEvent>) -> TaskOutcome {
        while let Some(event) = events.recv().await {
            if let Some(outcome) = self.record(event) {
                return outcome;
            }
        }

        warn!("Transfer queue stopped without reporting completion");
        TaskOutcome {
            status: TaskStatus::Failed,
            succeeded: self.succeeded,
            summary: format!(
                "Copy interrupted after {} files; {} failed",
                self.succeeded,
                self.failures.len()
            ),
            failures: self.failures,
        }
    }

    fn outcome(&self) -> TaskOutcome {
        if self.failures.is_empty() {
            let summary = format!("Copied {} files to the remote host", self.succeeded);
            info!("{}", summary);
            TaskOutcome::success(self.succeeded, summary)
        } else {
            let summary = format!(
                "Failed to copy {} of {} files",
                self.failures.len(),
                self.failures.len() + self.succeeded
            );
            error!("{}", summary);
            TaskOutcome {
                status: TaskStatus::Failed,
                succeeded: self.succeeded,
                failures: self.failures.clone(),
                summary,
            }
        }
    }
}
