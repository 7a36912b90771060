//! Append-only record of failures, kept apart from progress output.
//!
//! Every failed discovery, scan or download lands here with its URL and
//! reason, whatever the log verbosity. Entries are also held in memory for
//! the end-of-run summary.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

/// Which unit of work failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Fetching or parsing a legislature index page.
    Discovery,
    /// Fetching a month page.
    Scan,
    /// Fetching or writing one document.
    Download,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::Scan => "scan",
            Self::Download => "download",
        })
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// When the failure was recorded.
    pub at: DateTime<Utc>,
    /// Unit of work that failed.
    pub scope: ErrorScope,
    /// URL being fetched.
    pub url: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ErrorEntry {
    /// Tab-separated line written to the log file.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.scope,
            self.url,
            self.reason.replace(['\n', '\t'], " ")
        )
    }
}

/// Shared failure log. Safe to use from concurrent download tasks.
///
/// File appends happen on a dedicated writer thread, so `record` never
/// blocks a runtime worker on disk IO. Dropping the log flushes every
/// pending line.
#[derive(Debug, Default)]
pub struct ErrorLog {
    path: Option<PathBuf>,
    sink: Option<FileSink>,
    entries: Mutex<Vec<ErrorEntry>>,
}

/// Channel to the writer thread that owns the log file.
#[derive(Debug)]
struct FileSink {
    lines: Option<Sender<String>>,
    writer: Option<JoinHandle<()>>,
}

impl FileSink {
    fn spawn(path: PathBuf) -> Option<Self> {
        let (lines, receiver) = mpsc::channel::<String>();
        let writer_path = path.clone();
        let spawned = thread::Builder::new()
            .name("error-log".to_string())
            .spawn(move || {
                let mut file = None;
                for line in receiver {
                    if let Err(e) = append_line(&mut file, &writer_path, &line) {
                        warn!(path = %writer_path.display(), error = %e, "failed to write error log entry");
                    }
                }
            });
        match spawned {
            Ok(writer) => Some(Self {
                lines: Some(lines),
                writer: Some(writer),
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot start error log writer; failures are kept in memory only");
                None
            }
        }
    }

    fn send(&self, line: String) {
        if let Some(lines) = &self.lines
            && lines.send(line).is_err()
        {
            warn!("error log writer stopped; entry kept in memory only");
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop once the backlog is written.
        drop(self.lines.take());
        if let Some(writer) = self.writer.take()
            && writer.join().is_err()
        {
            warn!("error log writer panicked");
        }
    }
}

impl ErrorLog {
    /// A log that keeps entries in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A log that also appends to `path`. The file is opened on the first
    /// failure, so clean runs leave no file behind.
    #[must_use]
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            sink: FileSink::spawn(path.clone()),
            path: Some(path),
            ..Self::default()
        }
    }

    /// Destination file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records a failure.
    pub fn record(&self, scope: ErrorScope, url: impl Into<String>, reason: impl fmt::Display) {
        let entry = ErrorEntry {
            at: Utc::now(),
            scope,
            url: url.into(),
            reason: reason.to_string(),
        };

        if let Some(sink) = &self.sink {
            sink.send(entry.to_line());
        }

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when nothing has failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn append_line(file: &mut Option<File>, path: &Path, line: &str) -> std::io::Result<()> {
    if file.is_none() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        *file = Some(OpenOptions::new().create(true).append(true).open(path)?);
    }
    match file.as_mut() {
        Some(handle) => writeln!(handle, "{line}"),
        None => Ok(()),
    }
}
