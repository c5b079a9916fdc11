use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::FutureExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::config::NumericInput;
use crate::constants::{DEFAULT_CONCURRENT_UPLOADS, DEFAULT_DISPATCH_DELAY_MS};
use crate::error::JobError;
use crate::remote::RemoteSession;
use crate::transfer::job::{FailedTransfer, TransferOutcome, UploadJob};

/// Scheduling policy for a [`TransferQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of jobs in flight, at least 1
    pub concurrency: usize,
    /// Wait inserted before each dispatch, measured from the previous one
    pub dispatch_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENT_UPLOADS,
            dispatch_delay: Duration::from_millis(DEFAULT_DISPATCH_DELAY_MS),
        }
    }
}

impl QueueConfig {
    /// Build a config; a concurrency of zero falls back to the default.
    pub fn new(concurrency: usize, dispatch_delay_ms: u64) -> Self {
        let concurrency = if concurrency == 0 {
            warn!("Concurrency must be at least 1, using {}", DEFAULT_CONCURRENT_UPLOADS);
            DEFAULT_CONCURRENT_UPLOADS
        } else {
            concurrency
        };

        Self {
            concurrency,
            dispatch_delay: Duration::from_millis(dispatch_delay_ms),
        }
    }

    /// One upload at a time, the behaviour of a plain sequential loop.
    pub fn sequential(dispatch_delay_ms: u64) -> Self {
        Self::new(1, dispatch_delay_ms)
    }

    /// Build a config from raw user input.
    ///
    /// Missing, non-numeric or out-of-range values fall back to the defaults
    /// (10 uploads, 50 ms) with a warning.
    pub fn from_inputs(concurrency: Option<&NumericInput>, dispatch_delay: Option<&NumericInput>) -> Self {
        let concurrency = match concurrency {
            None => DEFAULT_CONCURRENT_UPLOADS,
            Some(input) => match input.as_i64() {
                Some(n) if n >= 1 => n as usize,
                _ => {
                    warn!("Invalid concurrent upload count '{}', using {}", input, DEFAULT_CONCURRENT_UPLOADS);
                    DEFAULT_CONCURRENT_UPLOADS
                }
            },
        };

        let delay_ms = match dispatch_delay {
            None => DEFAULT_DISPATCH_DELAY_MS,
            Some(input) => match input.as_i64() {
                Some(n) if n >= 0 => n as u64,
                _ => {
                    warn!("Invalid upload delay '{}', using {} ms", input, DEFAULT_DISPATCH_DELAY_MS);
                    DEFAULT_DISPATCH_DELAY_MS
                }
            },
        };

        Self {
            concurrency,
            dispatch_delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Queue lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueuePhase {
    /// Nothing enqueued yet
    #[default]
    Idle,
    /// Jobs are pending
    Running,
    /// Every job has been dispatched; some are still in flight
    Draining,
    /// Every job reached a terminal state
    Ended,
}

/// Counters reported with the `End` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of jobs that were in flight at once
    pub peak_active: usize,
    /// Lifecycle phase when the stats were taken; `Ended` on the `End` event
    pub phase: QueuePhase,
}

/// Lifecycle events, in the order the queue produces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A job finished successfully
    Processed(UploadJob),
    /// A job failed; siblings keep running
    Error(FailedTransfer),
    /// The pending list just became empty; jobs may still be in flight
    Empty,
    /// All jobs are done. Sent exactly once, after every other event.
    End(QueueStats),
}

/// Bookkeeping owned by the scheduler loop.
#[derive(Debug)]
struct QueueState {
    pending: VecDeque<UploadJob>,
    active: usize,
    stats: QueueStats,
}

impl QueueState {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            active: 0,
            stats: QueueStats::default(),
        }
    }

    fn accept(&mut self, jobs: Vec<UploadJob>) {
        if jobs.is_empty() {
            return;
        }
        self.stats.enqueued += jobs.len();
        self.pending.extend(jobs);
        self.stats.phase = QueuePhase::Running;
    }

    fn can_dispatch(&self, concurrency: usize) -> bool {
        !self.pending.is_empty() && self.active < concurrency
    }

    fn start_next(&mut self) -> Option<UploadJob> {
        let job = self.pending.pop_front()?;
        self.active += 1;
        self.stats.dispatched += 1;
        self.stats.peak_active = self.stats.peak_active.max(self.active);
        if self.pending.is_empty() {
            self.stats.phase = QueuePhase::Draining;
        }
        Some(job)
    }

    fn complete(&mut self, outcome: &TransferOutcome) {
        self.active -= 1;
        if outcome.is_success() {
            self.stats.succeeded += 1;
        } else {
            self.stats.failed += 1;
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.active == 0
    }
}

/// Cloneable handle for adding jobs to a queue, including while it runs.
///
/// The queue ends once every handle is dropped and all jobs are done.
#[derive(Clone)]
pub struct QueueHandle {
    intake: mpsc::UnboundedSender<Vec<UploadJob>>,
}

impl QueueHandle {
    /// Add jobs to the end of the pending list
    pub fn enqueue(&self, jobs: Vec<UploadJob>) -> Result<()> {
        self.intake
            .send(jobs)
            .map_err(|_| anyhow!("Transfer queue has already ended"))
    }
}

/// Bounded-concurrency upload scheduler.
///
/// Jobs start in FIFO order, at most `concurrency` at a time, each start
/// waiting `dispatch_delay` after the previous one. With overwrite disabled a
/// job first checks whether its target exists and fails without uploading if
/// it does. A failed job never cancels its siblings.
///
/// ```no_run
/// use std::sync::Arc;
/// use ssh_copy::remote::ssh::{SshConfig, SshSession};
/// use ssh_copy::transfer::{QueueConfig, TransferQueue, TransferReporter, UploadJob};
///
/// # async fn example() -> anyhow::Result<()> {
/// let session = Arc::new(SshSession::connect(SshConfig::default(), 10).await?);
/// let (queue, events) = TransferQueue::new(session, QueueConfig::default(), true);
/// queue.enqueue(vec![UploadJob::new("/build/app.tar.gz", "/srv/app.tar.gz")])?;
///
/// let (_stats, outcome) = tokio::join!(queue.run(), TransferReporter::new().consume(events));
/// println!("{}", outcome.summary);
/// # Ok(())
/// # }
/// ```
pub struct TransferQueue<S: RemoteSession> {
    session: Arc<S>,
    config: QueueConfig,
    overwrite: bool,
    intake_tx: mpsc::UnboundedSender<Vec<UploadJob>>,
    intake_rx: mpsc::UnboundedReceiver<Vec<UploadJob>>,
    events: mpsc::UnboundedSender<QueueEvent>,
}

impl<S: RemoteSession> TransferQueue<S> {
    /// Create a queue and the receiving end of its event stream
    pub fn new(
        session: Arc<S>,
        config: QueueConfig,
        overwrite: bool,
    ) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let queue = Self {
            session,
            config,
            overwrite,
            intake_tx,
            intake_rx,
            events,
        };

        (queue, events_rx)
    }

    /// Handle for enqueueing from elsewhere
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            intake: self.intake_tx.clone(),
        }
    }

    /// Add jobs to the end of the pending list
    pub fn enqueue(&self, jobs: Vec<UploadJob>) -> Result<()> {
        self.intake_tx
            .send(jobs)
            .map_err(|_| anyhow!("Transfer queue has already ended"))
    }

    /// Run until every enqueued job is done and all handles are dropped.
    pub async fn run(self) -> QueueStats {
        let TransferQueue {
            session,
            config,
            overwrite,
            intake_tx,
            mut intake_rx,
            events,
        } = self;
        drop(intake_tx);

        let emit = |event: QueueEvent| {
            if events.send(event).is_err() {
                debug!("Queue event dropped, no listener");
            }
        };

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<TransferOutcome>();
        let mut state = QueueState::new();
        let mut intake_open = true;
        let mut next_dispatch = Instant::now() + config.dispatch_delay;

        debug!("Transfer queue started (concurrency {}, delay {:?})",
               config.concurrency, config.dispatch_delay);

        loop {
            if state.is_idle() && !intake_open {
                break;
            }
            let can_dispatch = state.can_dispatch(config.concurrency);

            tokio::select! {
                biased;

                Some(outcome) = done_rx.recv(), if state.active > 0 => {
                    state.complete(&outcome);
                    match outcome {
                        TransferOutcome::Succeeded(job) => {
                            debug!("Uploaded {}", job);
                            emit(QueueEvent::Processed(job));
                        }
                        TransferOutcome::Failed(failed) => {
                            debug!("Upload failed for {}: {}", failed.target(), failed.error);
                            emit(QueueEvent::Error(failed));
                        }
                    }
                }

                batch = intake_rx.recv(), if intake_open => {
                    match batch {
                        Some(jobs) => {
                            debug!("Enqueued {} jobs", jobs.len());
                            state.accept(jobs);
                        }
                        None => intake_open = false,
                    }
                }

                _ = wait_until(next_dispatch), if can_dispatch => {
                    if let Some(job) = state.start_next() {
                        next_dispatch = Instant::now() + config.dispatch_delay;
                        debug!("Dispatching upload {} ({} in flight)", job, state.active);
                        spawn_job(Arc::clone(&session), job, overwrite, done_tx.clone());

                        if state.pending.is_empty() {
                            emit(QueueEvent::Empty);
                        }
                    }
                }

                else => break,
            }
        }

        state.stats.phase = QueuePhase::Ended;
        debug!("Transfer queue {:?} after {} dispatches", state.stats.phase, state.stats.dispatched);
        info!("Transfer queue finished: {} succeeded, {} failed",
              state.stats.succeeded, state.stats.failed);
        emit(QueueEvent::End(state.stats));

        state.stats
    }
}

async fn wait_until(deadline: Instant) {
    if Instant::now() < deadline {
        sleep_until(deadline).await;
    }
}

fn spawn_job<S: RemoteSession>(
    session: Arc<S>,
    job: UploadJob,
    overwrite: bool,
    done: mpsc::UnboundedSender<TransferOutcome>,
) {
    tokio::spawn(async move {
        let result = AssertUnwindSafe(execute_job(session.as_ref(), &job, overwrite))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(())) => TransferOutcome::Succeeded(job),
            Ok(Err(error)) => TransferOutcome::Failed(FailedTransfer::new(job, error)),
            Err(_) => {
                let error = JobError::Transfer {
                    target: job.target().to_string(),
                    message: "upload task panicked".to_string(),
                };
                TransferOutcome::Failed(FailedTransfer::new(job, error))
            }
        };

        // The scheduler holds a sender for as long as it runs.
        let _ = done.send(outcome);
    });
}

/// The work of one job: optional existence check, then the upload.
async fn execute_job<S: RemoteSession + ?Sized>(
    session: &S,
    job: &UploadJob,
    overwrite: bool,
) -> std::result::Result<(), JobError> {
    let target = job.target();

    if !overwrite {
        let exists = session
            .check_exists(target)
            .await
            .map_err(|e| JobError::transfer(target, &e))?;

        if exists {
            return Err(JobError::ExistenceConflict {
                target: target.to_string(),
            });
        }
    }

    session
        .upload_file(job.source(), target)
        .await
        .map_err(|e| JobError::transfer(target, &e))
}
