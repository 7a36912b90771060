//! End-to-end run: discovery, scanning, job planning, downloads.
//!
//! Discovery and scanning run one request at a time, per legislature and
//! per period, so the full job list (and its size) is known before any
//! download starts. Downloads then fan out through the [`DownloadEngine`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::config::ScrapeConfig;
use crate::destination::{disambiguate, resolve_destination};
use crate::discovery::{Period, discover_periods};
use crate::download::{DownloadEngine, DownloadJob, EngineError, JobReport};
use crate::error_log::ErrorLog;
use crate::fetch::Transport;
use crate::scanner::{DocumentLink, scan_period};

/// Links found on one month page, reported as soon as the page is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodScan {
    /// Legislature the page belongs to.
    pub legislature: u32,
    /// Archive month.
    pub period: Period,
    /// Download links on the page.
    pub links: usize,
}

/// Result of discovery and scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPlan {
    /// One job per distinct document.
    pub jobs: Vec<DownloadJob>,
    /// Periods the index pages confirmed, before the year filter.
    pub periods_discovered: usize,
    /// Periods whose month page was requested.
    pub periods_scanned: usize,
    /// Download links found across all month pages.
    pub links_found: usize,
    /// True when Ctrl+C stopped scanning early.
    pub interrupted: bool,
}

/// What a run did, for the final summary and the exit policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Periods the index pages confirmed.
    pub periods_discovered: usize,
    /// Month pages requested.
    pub periods_scanned: usize,
    /// Download links found.
    pub links_found: usize,
    /// Distinct jobs planned.
    pub jobs: usize,
    /// Files written.
    pub downloaded: usize,
    /// Files already present.
    pub skipped: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Entries in the error log, including discovery and scan failures.
    pub errors_logged: usize,
    /// True when Ctrl+C cut the run short.
    pub interrupted: bool,
    /// True when no downloads were attempted.
    pub dry_run: bool,
    /// Per-job outcomes in planning order.
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    /// Summary of a plan that was listed but not downloaded.
    #[must_use]
    pub fn dry_run(plan: &JobPlan, errors: &ErrorLog) -> Self {
        Self {
            periods_discovered: plan.periods_discovered,
            periods_scanned: plan.periods_scanned,
            links_found: plan.links_found,
            jobs: plan.jobs.len(),
            errors_logged: errors.len(),
            interrupted: plan.interrupted,
            dry_run: true,
            ..Self::default()
        }
    }

    /// Returns true when anything at all failed during the run.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors_logged > 0
    }
}

/// Classifies links and resolves their destinations, one job per document.
///
/// Repeated links to the same URL collapse into one job. A different URL
/// whose natural path is already taken gets the URL hash in its file name,
/// so no document is ever dropped.
#[must_use]
pub fn build_jobs(config: &ScrapeConfig, links: Vec<DocumentLink>) -> Vec<DownloadJob> {
    let mut owners: HashMap<PathBuf, String> = HashMap::new();
    let mut jobs = Vec::with_capacity(links.len());
    for link in links {
        let category = config.classifier.classify(&link.url);
        let mut destination =
            resolve_destination(&config.output_root, config.commission, &link, category);

        if let Some(owner) = owners.get(&destination) {
            if *owner == link.url {
                debug!(url = %link.url, "duplicate link, already planned");
                continue;
            }
            let moved = disambiguate(&destination, &link.url);
            debug!(
                url = %link.url,
                taken_by = %owner,
                path = %moved.display(),
                "destination already used by another document"
            );
            destination = moved;
            match owners.get(&destination) {
                Some(owner) if *owner == link.url => continue,
                Some(owner) => {
                    warn!(
                        url = %link.url,
                        taken_by = %owner,
                        path = %destination.display(),
                        "URL hash collision; document not planned"
                    );
                    continue;
                }
                None => {}
            }
        }

        owners.insert(destination.clone(), link.url.clone());
        jobs.push(DownloadJob {
            link,
            category,
            destination,
        });
    }
    jobs
}

/// Discovers periods and scans month pages for every configured legislature.
///
/// The year filter narrows the discovered periods; it never adds any.
pub async fn plan_jobs(
    transport: &dyn Transport,
    config: &ScrapeConfig,
    errors: &ErrorLog,
    interrupted: &AtomicBool,
) -> JobPlan {
    plan_jobs_with(transport, config, errors, interrupted, &mut |_: PeriodScan| {}).await
}

/// [`plan_jobs`], calling `on_period` after each month page is scanned.
#[instrument(skip_all, fields(legislatures = ?config.legislatures))]
pub async fn plan_jobs_with(
    transport: &dyn Transport,
    config: &ScrapeConfig,
    errors: &ErrorLog,
    interrupted: &AtomicBool,
    on_period: &mut (dyn FnMut(PeriodScan) + Send),
) -> JobPlan {
    let mut plan = JobPlan::default();
    let mut links = Vec::new();

    'legislatures: for &legislature in &config.legislatures {
        if interrupted.load(Ordering::SeqCst) {
            plan.interrupted = true;
            break;
        }
        let periods = discover_periods(transport, config, legislature, errors).await;
        plan.periods_discovered += periods.len();

        for period in periods
            .into_iter()
            .filter(|period| config.includes_year(period.year))
        {
            if interrupted.load(Ordering::SeqCst) {
                plan.interrupted = true;
                break 'legislatures;
            }
            let found = scan_period(transport, config, legislature, period, errors).await;
            plan.periods_scanned += 1;
            plan.links_found += found.len();
            on_period(PeriodScan {
                legislature,
                period,
                links: found.len(),
            });
            links.extend(found);
        }
    }

    plan.jobs = build_jobs(config, links);
    if plan.interrupted {
        warn!(jobs = plan.jobs.len(), "scanning interrupted");
    }
    info!(
        periods_discovered = plan.periods_discovered,
        periods_scanned = plan.periods_scanned,
        links = plan.links_found,
        jobs = plan.jobs.len(),
        "job planning complete"
    );
    plan
}

/// Downloads every job of `plan` with `engine`.
///
/// # Errors
///
/// Returns [`EngineError`] only when the engine itself breaks; job failures
/// are counted in the summary.
pub async fn execute_plan(
    plan: JobPlan,
    engine: &DownloadEngine,
    transport: Arc<dyn Transport>,
    errors: Arc<ErrorLog>,
) -> Result<RunSummary, EngineError> {
    let jobs = plan.jobs.len();
    let batch = engine.run(plan.jobs, transport, Arc::clone(&errors)).await?;
    Ok(RunSummary {
        periods_discovered: plan.periods_discovered,
        periods_scanned: plan.periods_scanned,
        links_found: plan.links_found,
        jobs,
        downloaded: batch.stats.downloaded(),
        skipped: batch.stats.skipped(),
        failed: batch.stats.failed(),
        errors_logged: errors.len(),
        interrupted: plan.interrupted || batch.interrupted,
        dry_run: false,
        reports: batch.reports,
    })
}

/// Plans and downloads in one call.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConcurrency`] for an out-of-range
/// `config.concurrency`, or any other engine failure.
pub async fn run_pipeline(
    config: &ScrapeConfig,
    transport: Arc<dyn Transport>,
    errors: Arc<ErrorLog>,
    interrupted: Arc<AtomicBool>,
) -> Result<RunSummary, EngineError> {
    let engine = DownloadEngine::new(config.concurrency)?.with_interrupt_flag(Arc::clone(&interrupted));
    let plan = plan_jobs(transport.as_ref(), config, &errors, &interrupted).await;
    execute_plan(plan, &engine, transport, errors).await
}
