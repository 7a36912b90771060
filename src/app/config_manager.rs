//! Builds the run configuration: CLI flags over config file over defaults.

use anyhow::{Context, Result};
use camera_pdfs::{FileConfig, ScrapeConfig};
use tracing::debug;

use crate::cli::Args;

/// Resolves and validates the configuration for this run.
///
/// An explicit `--config` path must exist; the default location is optional.
pub(crate) fn resolve_config(args: &Args) -> Result<ScrapeConfig> {
    let file = match &args.config {
        Some(path) => Some(
            FileConfig::load(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
        ),
        None => FileConfig::load_default().context("loading default config file")?,
    };
    if file.is_some() {
        debug!("config file loaded");
    }

    let base = match &file {
        Some(file) => ScrapeConfig::default().with_file(file),
        None => ScrapeConfig::default(),
    };
    let config = apply_cli_overrides(base, args);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Overlays every flag the user actually passed.
pub(crate) fn apply_cli_overrides(mut config: ScrapeConfig, args: &Args) -> ScrapeConfig {
    if let Some(root) = &args.output_root {
        config.output_root.clone_from(root);
    }
    if !args.legislatures.is_empty() {
        config.legislatures.clone_from(&args.legislatures);
    }
    if let Some(commission) = args.commission {
        config.commission = commission;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = usize::from(concurrency);
    }
    if args.start_year.is_some() {
        config.start_year = args.start_year;
    }
    if args.end_year.is_some() {
        config.end_year = args.end_year;
    }
    if let Some(label) = &args.download_label {
        config.download_label.clone_from(label);
    }
    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if args.error_log.is_some() {
        config.error_log.clone_from(&args.error_log);
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    if args.fail_on_errors {
        config.fail_on_errors = true;
    }
    config
}
