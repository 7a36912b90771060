//! Semaphore-bounded download engine.
//!
//! # Concurrency Model
//!
//! - Each job runs in its own Tokio task
//! - A semaphore permit is acquired before a task is spawned, so at most
//!   `concurrency` transfers are in flight
//! - Permits are released automatically when a task finishes (RAII)
//! - Tasks share nothing but the output tree, the error log and the counters
//!
//! # Interrupts
//!
//! Once the interrupt flag is set no new job starts. Jobs not yet started and
//! transfers in flight end as failed with reason `interrupted`; their
//! temporary files are removed, so no partial file ever sits at a final path.

mod persistence;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{
    BatchResult, DownloadJob, DownloadStats, INTERRUPTED_REASON, JobReport, MAX_CONCURRENCY,
    MIN_CONCURRENCY, Outcome,
};
use crate::error_log::{ErrorLog, ErrorScope};
use crate::fetch::{FetchError, Transport};

/// How often a waiting future re-checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Runs download jobs with a fixed upper bound on parallel transfers.
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    interrupted: Arc<AtomicBool>,
    progress: Option<UnboundedSender<JobReport>>,
}

/// State every job task needs.
struct JobContext {
    transport: Arc<dyn Transport>,
    errors: Arc<ErrorLog>,
    stats: Arc<DownloadStats>,
    interrupted: Arc<AtomicBool>,
    progress: Option<UnboundedSender<JobReport>>,
}

impl JobContext {
    /// Records a terminal outcome everywhere it is observed.
    fn finish(&self, index: usize, url: String, destination: PathBuf, outcome: Outcome) -> JobReport {
        match &outcome {
            Outcome::Failed { reason } => {
                warn!(url = %url, reason = %reason, "download failed");
                self.errors.record(ErrorScope::Download, url.as_str(), reason);
            }
            Outcome::Downloaded { bytes } => {
                info!(url = %url, path = %destination.display(), bytes, "downloaded");
            }
            Outcome::SkippedExisting => {
                debug!(path = %destination.display(), "already present, skipped");
            }
        }
        self.stats.record(&outcome);

        let report = JobReport {
            index,
            url,
            destination,
            outcome,
        };
        if let Some(progress) = &self.progress {
            // Receiver gone means nobody is watching; the batch carries on.
            let _ = progress.send(report.clone());
        }
        report
    }
}

impl DownloadEngine {
    /// Creates an engine allowing `concurrency` simultaneous transfers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            interrupted: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Uses `flag` as the interrupt signal.
    #[must_use]
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Sends every [`JobReport`] to `progress` as soon as its job finishes.
    #[must_use]
    pub fn with_progress(mut self, progress: UnboundedSender<JobReport>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every job to a terminal outcome.
    ///
    /// Individual failures never make this method fail; they are reported as
    /// [`Outcome::Failed`] and recorded in `errors`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if permit acquisition fails.
    #[instrument(skip_all, fields(jobs = jobs.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        jobs: Vec<DownloadJob>,
        transport: Arc<dyn Transport>,
        errors: Arc<ErrorLog>,
    ) -> Result<BatchResult, EngineError> {
        let total = jobs.len();
        let stats = Arc::new(DownloadStats::new());
        let context = Arc::new(JobContext {
            transport,
            errors,
            stats: Arc::clone(&stats),
            interrupted: Arc::clone(&self.interrupted),
            progress: self.progress.clone(),
        });
        let mut reports: Vec<JobReport> = Vec::with_capacity(total);
        let mut handles: Vec<(usize, String, PathBuf, JoinHandle<JobReport>)> = Vec::new();
        let mut was_interrupted = false;

        info!(total, "starting downloads");

        for (index, job) in jobs.into_iter().enumerate() {
            if was_interrupted || self.is_interrupted() {
                was_interrupted = true;
                reports.push(context.finish(
                    index,
                    job.link.url,
                    job.destination,
                    Outcome::failed(INTERRUPTED_REASON),
                ));
                continue;
            }

            // Race the permit against the interrupt flag so Ctrl+C during a
            // full-concurrency wait is seen immediately.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&self.interrupted) => None,
                result = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                was_interrupted = true;
                reports.push(context.finish(
                    index,
                    job.link.url,
                    job.destination,
                    Outcome::failed(INTERRUPTED_REASON),
                ));
                continue;
            };

            let url = job.link.url.clone();
            let destination = job.destination.clone();
            let context = Arc::clone(&context);
            handles.push((
                index,
                url,
                destination,
                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;
                    let outcome =
                        process_job(&job, context.transport.as_ref(), &context.interrupted).await;
                    context.finish(index, job.link.url, job.destination, outcome)
                }),
            ));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        for (index, url, destination, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(index, error = %e, "download task panicked");
                    reports.push(context.finish(
                        index,
                        url,
                        destination,
                        Outcome::failed(format!("download task failed: {e}")),
                    ));
                }
            }
        }
        reports.sort_by_key(|report| report.index);

        let was_interrupted = was_interrupted || self.is_interrupted();
        drop(context);
        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| shared.snapshot());
        info!(
            downloaded = stats.downloaded(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            total,
            interrupted = was_interrupted,
            "downloads complete"
        );

        Ok(BatchResult {
            stats,
            reports,
            interrupted: was_interrupted,
        })
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// `pending -> skipped | in-flight -> downloaded | failed`.
async fn process_job(job: &DownloadJob, transport: &dyn Transport, interrupted: &AtomicBool) -> Outcome {
    if persistence::is_complete(&job.destination).await {
        return Outcome::SkippedExisting;
    }
    if interrupted.load(Ordering::SeqCst) {
        return Outcome::failed(INTERRUPTED_REASON);
    }
    if let Err(e) = persistence::ensure_parent(&job.destination).await {
        return Outcome::failed(e);
    }

    let temp = persistence::temp_path_for(&job.destination);
    let transfer = tokio::select! {
        biased;
        () = wait_for_interrupt(interrupted) => None,
        result = transport.download_to(job.url(), &temp) => Some(result),
    };

    match transfer {
        None => {
            persistence::discard(&temp).await;
            Outcome::failed(INTERRUPTED_REASON)
        }
        Some(Err(e)) => {
            persistence::discard(&temp).await;
            Outcome::failed(e)
        }
        Some(Ok(0)) => {
            persistence::discard(&temp).await;
            Outcome::failed(FetchError::empty_body(job.url()))
        }
        Some(Ok(bytes)) => match persistence::finalize(&temp, &job.destination).await {
            Ok(()) => Outcome::Downloaded { bytes },
            Err(e) => {
                persistence::discard(&temp).await;
                Outcome::failed(e)
            }
        },
    }
}

/// Resolves once `flag` is set.
async fn wait_for_interrupt(flag: &AtomicBool) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}
