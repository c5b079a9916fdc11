//! The upload pipeline.
//!
//! A [`TransferQueue`] runs [`UploadJob`]s against a
//! [`RemoteSession`](crate::remote::RemoteSession) with bounded concurrency
//! and emits [`QueueEvent`]s; a [`TransferReporter`] folds those events into
//! the run's [`TaskOutcome`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌──────────────────┐  spawn   ┌──────────────┐
//! │  UploadJobs  │───────────▶│  TransferQueue   │─────────▶│  job tasks   │
//! └──────────────┘            │ (scheduler loop) │◀─────────│ exists+upload│
//!                             └────────┬─────────┘  outcome └──────────────┘
//!                                      │ QueueEvent
//!                             ┌────────▼─────────┐
//!                             │ TransferReporter │──▶ TaskOutcome
//!                             └──────────────────┘
//! ```

/// Upload jobs and per-job outcomes
pub mod job;

/// Bounded-concurrency scheduler
pub mod queue;

/// Event aggregation and final verdict
pub mod reporter;

pub use job::{FailedTransfer, TransferOutcome, UploadJob};
pub use queue::{QueueConfig, QueueEvent, QueueHandle, QueuePhase, QueueStats, TransferQueue};
pub use reporter::{TaskOutcome, TaskStatus, TransferReporter};
