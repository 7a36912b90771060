use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use camera_pdfs::{
    DownloadEngine, ErrorLog, HttpClient, PeriodScan, RetryPolicy, RunSummary, Transport,
    execute_plan, plan_jobs_with,
};
use clap::Parser;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_manager, exit_handler, progress_manager, terminal};
use crate::cli::Args;
use crate::output;

pub(crate) async fn run_archiver() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    terminal::init_tracing(args.default_log_level());
    debug!(?args, "CLI arguments parsed");

    let config = config_manager::resolve_config(&args)?;
    config
        .prepare_output_root()
        .context("preparing output root")?;
    info!(
        output_root = %config.output_root.display(),
        legislatures = ?config.legislatures,
        commission = config.commission,
        "archiver starting"
    );

    let errors = Arc::new(ErrorLog::to_file(config.error_log_path()));
    let client = HttpClient::with_settings(
        config.connect_timeout_secs,
        config.read_timeout_secs,
        RetryPolicy::with_max_retries(config.max_retries),
    )
    .context("building HTTP client")?;
    let transport: Arc<dyn Transport> = Arc::new(client);

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let quiet = args.quiet;
    let mut report_period = |scan: PeriodScan| {
        if !quiet {
            output::print_period(&scan);
        }
    };
    let plan = plan_jobs_with(
        transport.as_ref(),
        &config,
        &errors,
        &interrupted,
        &mut report_period,
    )
    .await;

    if args.dry_run {
        output::print_plan(&plan);
        let summary = RunSummary::dry_run(&plan, &errors);
        output::print_summary(&summary, errors.path());
        return Ok(exit_handler::determine_exit_outcome(
            &summary,
            config.fail_on_errors,
        ));
    }

    let total = plan.jobs.len();
    let mode = progress_manager::ProgressMode::select(
        terminal::should_use_progress_bar(
            io::stderr().is_terminal(),
            args.quiet,
            terminal::is_dumb_terminal(),
        ),
        args.quiet,
    );
    let (progress_tx, progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let progress_handle = progress_manager::spawn_progress_ui(mode, progress_rx, total);

    let engine = DownloadEngine::new(config.concurrency)?
        .with_interrupt_flag(Arc::clone(&interrupted))
        .with_progress(progress_tx);
    let summary = execute_plan(plan, &engine, transport, Arc::clone(&errors)).await?;

    // Closing the last sender lets the progress task drain and exit.
    drop(engine);
    let _ = progress_handle.await;

    output::print_summary(&summary, errors.path());
    if summary.interrupted {
        warn!(
            downloaded = summary.downloaded,
            jobs = summary.jobs,
            "Interrupted. Run again to resume."
        );
    }

    Ok(exit_handler::determine_exit_outcome(
        &summary,
        config.fail_on_errors,
    ))
}
