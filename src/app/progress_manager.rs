//! Live download progress.
//!
//! The engine sends one [`JobReport`] per finished job. On an interactive
//! terminal they drive an indicatif bar; otherwise each report becomes one
//! stdout line. The task ends when the engine drops its sender.

use std::time::Duration;

use camera_pdfs::JobReport;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::output;

/// How reports are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressMode {
    /// indicatif bar on stderr, failures printed above it.
    Bar,
    /// One stdout line per job.
    Lines,
    /// Nothing (`--quiet`).
    Silent,
}

impl ProgressMode {
    pub(crate) fn select(use_bar: bool, quiet: bool) -> Self {
        if quiet {
            Self::Silent
        } else if use_bar {
            Self::Bar
        } else {
            Self::Lines
        }
    }
}

/// Spawns the consumer for `reports`. Await the handle after the engine is
/// dropped to flush the last lines.
pub(crate) fn spawn_progress_ui(
    mode: ProgressMode,
    mut reports: UnboundedReceiver<JobReport>,
    total: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = (mode == ProgressMode::Bar).then(|| new_bar(total));
        let mut done = 0usize;

        while let Some(report) = reports.recv().await {
            done += 1;
            match (&bar, mode) {
                (Some(bar), _) => {
                    bar.inc(1);
                    if report.outcome.is_failed() {
                        bar.println(output::render_report_line(done, total, &report));
                    }
                    if let Some(name) = report.destination.file_name() {
                        bar.set_message(name.to_string_lossy().into_owned());
                    }
                }
                (None, ProgressMode::Lines) => {
                    println!("{}", output::render_report_line(done, total, &report));
                }
                (None, _) => {}
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    })
}

fn new_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use camera_pdfs::Outcome;

    use super::*;

    fn report(index: usize) -> JobReport {
        JobReport {
            index,
            url: format!("https://docs.example/{index}.pdf"),
            destination: PathBuf::from(format!("pdfs/{index}.pdf")),
            outcome: Outcome::SkippedExisting,
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(ProgressMode::select(true, false), ProgressMode::Bar);
        assert_eq!(ProgressMode::select(false, false), ProgressMode::Lines);
        assert_eq!(ProgressMode::select(true, true), ProgressMode::Silent);
    }

    #[tokio::test]
    async fn test_progress_task_ends_when_sender_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_progress_ui(ProgressMode::Silent, rx, 2);
        tx.send(report(0)).unwrap();
        tx.send(report(1)).unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
