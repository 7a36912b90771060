//! Commission document archiver for camera.it.
//!
//! Finds the archive months a parliamentary commission has published,
//! collects the "Scarica PDF" links from each month page, sorts the
//! documents into transcripts (`stenografici`), bulletins (`bollettini`) and
//! everything else, and mirrors them into a stable directory tree.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`classify`] - URL rule table mapping documents to a [`Category`]
//! - [`discovery`] - Archive periods listed on a legislature index page
//! - [`scanner`] - Download links on a month page
//! - [`destination`] - Deterministic output paths
//! - [`download`] - Bounded-concurrency download engine
//! - [`pipeline`] - The full run, from discovery to summary
//! - [`fetch`] - HTTP transport with timeouts and retries
//! - [`error_log`] - Side-channel failure record
//! - [`config`] - Run configuration and TOML config file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod destination;
pub mod discovery;
pub mod download;
pub mod error_log;
pub mod fetch;
pub mod pipeline;
pub mod scanner;
mod user_agent;

// Re-export commonly used types
pub use classify::{Category, Classifier, ClassifierRule, Marker};
pub use config::{ConfigError, FileConfig, ScrapeConfig};
pub use destination::resolve_destination;
pub use discovery::{Period, discover_periods, extract_periods};
pub use download::{
    BatchResult, DEFAULT_CONCURRENCY, DownloadEngine, DownloadJob, DownloadStats, EngineError,
    JobReport, Outcome,
};
pub use error_log::{ErrorEntry, ErrorLog, ErrorScope};
pub use fetch::{FetchError, HttpClient, PageResponse, RetryPolicy, Transport};
pub use pipeline::{
    JobPlan, PeriodScan, RunSummary, build_jobs, execute_plan, plan_jobs, plan_jobs_with,
    run_pipeline,
};
pub use scanner::{DocumentLink, extract_links, scan_period};
