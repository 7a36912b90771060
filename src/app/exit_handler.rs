//! Exit code logic for the archiver process.
//!
//! Single responsibility: map a finished run to the process exit outcome.
//! Failed pages and documents are partial, not fatal: they only change the
//! exit status when the user asked for it with `--fail-on-errors`.

use camera_pdfs::RunSummary;

use crate::ProcessExit;

/// Determines the process exit outcome for a completed run.
pub(crate) fn determine_exit_outcome(summary: &RunSummary, fail_on_errors: bool) -> ProcessExit {
    if summary.interrupted {
        ProcessExit::Interrupted
    } else if fail_on_errors && summary.has_failures() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
