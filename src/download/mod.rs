//! Bounded-concurrency document downloads.
//!
//! The engine takes the complete job list, skips files already on disk,
//! streams the rest through the [`Transport`](crate::fetch::Transport) into a
//! temporary file, and renames it into place once the transfer succeeds.
//! Every job ends in exactly one [`Outcome`]; a failure never affects its
//! siblings.

mod engine;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classify::Category;
use crate::scanner::DocumentLink;

pub use engine::{DownloadEngine, EngineError};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default number of concurrent transfers.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Reason recorded for jobs cut short by Ctrl+C.
pub const INTERRUPTED_REASON: &str = "interrupted";

/// One document to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Source link.
    pub link: DocumentLink,
    /// Category from the classifier.
    pub category: Category,
    /// Final file path.
    pub destination: PathBuf,
}

impl DownloadJob {
    /// Document URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.link.url
    }
}

/// Terminal state of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Destination already present and non-empty; no request was made.
    SkippedExisting,
    /// Fetched and written.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
    /// Not written.
    Failed {
        /// Why.
        reason: String,
    },
}

impl Outcome {
    /// Returns true for [`Outcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub(crate) fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedExisting => f.write_str("skipped (exists)"),
            Self::Downloaded { bytes } => write!(f, "downloaded ({bytes} bytes)"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome of one job, emitted as soon as the job finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Position of the job in the submitted list.
    pub index: usize,
    /// Document URL.
    pub url: String,
    /// Final file path.
    pub destination: PathBuf,
    /// What happened.
    pub outcome: Outcome,
}

/// Counters for one batch. Updated from concurrent tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of files written.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Returns the number of jobs skipped because the file existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed jobs.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of finished jobs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded() + self.skipped() + self.failed()
    }

    /// Copy of the current counts.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        Self {
            downloaded: AtomicUsize::new(self.downloaded()),
            skipped: AtomicUsize::new(self.skipped()),
            failed: AtomicUsize::new(self.failed()),
        }
    }

    pub(crate) fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::SkippedExisting => &self.skipped,
            Outcome::Downloaded { .. } => &self.downloaded,
            Outcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a batch produced.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Aggregate counters.
    pub stats: DownloadStats,
    /// One report per submitted job, in submission order.
    pub reports: Vec<JobReport>,
    /// True when Ctrl+C cut the batch short.
    pub interrupted: bool,
}
