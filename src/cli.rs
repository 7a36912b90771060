//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Archive a camera.it commission's published PDFs.
///
/// Finds the months the commission archive lists for each legislature,
/// collects the "Scarica PDF" links and mirrors the documents into
/// `<out>/leg<N>/<stenografici|bollettini|other>/<year>/`.
#[derive(Parser, Debug)]
#[command(name = "camera-pdfs")]
#[command(author, version, about)]
pub struct Args {
    /// Output root directory [default: pdfs]
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Legislature to process (repeatable) [default: 19]
    #[arg(short = 'L', long = "legislature", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub legislatures: Vec<u32>,

    /// Commission identifier [default: 21]
    #[arg(long, value_name = "ID")]
    pub commission: Option<u32>,

    /// Maximum concurrent downloads (1-32) [default: 6]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..=32))]
    pub concurrency: Option<u16>,

    /// Keep only archive months from this year on
    #[arg(long = "start", value_name = "YEAR")]
    pub start_year: Option<i32>,

    /// Keep only archive months up to this year
    #[arg(long = "end", value_name = "YEAR")]
    pub end_year: Option<i32>,

    /// Anchor text marking a document link [default: "scarica pdf"]
    #[arg(long = "label", value_name = "TEXT")]
    pub download_label: Option<String>,

    /// Site root [default: https://www.camera.it]
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Config file (TOML) [default: $XDG_CONFIG_HOME/camera-pdfs/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Error log file [default: <out>/errors.log]
    #[arg(long, value_name = "PATH")]
    pub error_log: Option<PathBuf>,

    /// Retries for transient network failures (0-10) [default: 3]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,

    /// Exit with status 1 when any page or document failed
    #[arg(long)]
    pub fail_on_errors: bool,

    /// List the planned downloads without fetching any document
    #[arg(long)]
    pub dry_run: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Same as -v
    #[arg(long)]
    pub debug: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,
}

impl Args {
    /// Default tracing level. Priority: `-q` > `-v` count (`--debug` counts once) > info.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose.saturating_add(u8::from(self.debug)) {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
