//! CLI entry point for the camera.it commission archiver.

use std::process::ExitCode;

use anyhow::Result;

mod app;
mod cli;
mod output;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Run completed. Failed documents alone do not change this.
    Success,
    /// `--fail-on-errors` was given and something failed.
    Failure,
    /// Ctrl+C stopped the run.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let exit = app::runtime::run_archiver().await?;
    Ok(exit.into())
}
