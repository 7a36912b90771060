//! Run configuration.
//!
//! [`ScrapeConfig`] is the explicit configuration handed to discovery, the
//! scanner, the destination resolver and the engine. It starts from built-in
//! defaults, takes values from an optional TOML [`FileConfig`], and the CLI
//! overrides both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::classify::{Classifier, ClassifierRule};
use crate::discovery::Period;
use crate::download::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::fetch::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS};

/// Site root all archive URLs are built from.
pub const DEFAULT_BASE_URL: &str = "https://www.camera.it";

/// Commissione parlamentare per la vigilanza dei servizi radiotelevisivi.
pub const DEFAULT_COMMISSION: u32 = 21;

/// Current legislature.
pub const DEFAULT_LEGISLATURE: u32 = 19;

/// Default output root, relative to the working directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "pdfs";

/// Anchor text the site uses for document download links.
pub const DEFAULT_DOWNLOAD_LABEL: &str = "scarica pdf";

/// File name of the error log inside the output root.
pub const ERROR_LOG_FILE_NAME: &str = "errors.log";

/// Page id of the commission archive on camera.it.
const ARCHIVE_PAGE_ID: &str = "210";

/// Configuration errors. All of them abort the run before any request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The output root cannot be created.
    #[error("cannot create output root {path}: {source}")]
    OutputRoot {
        /// Output root path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeConfig {
    /// Site root, without a trailing slash.
    pub base_url: String,
    /// Commission identifier (`commissione=` query parameter).
    pub commission: u32,
    /// Legislatures to process, in order.
    pub legislatures: Vec<u32>,
    /// Root of the output tree.
    pub output_root: PathBuf,
    /// Anchor text that marks a document link (compared case-insensitively).
    pub download_label: String,
    /// Concurrent downloads.
    pub concurrency: usize,
    /// Keep only discovered periods from this year on.
    pub start_year: Option<i32>,
    /// Keep only discovered periods up to this year.
    pub end_year: Option<i32>,
    /// Category rule table.
    pub classifier: Classifier,
    /// Transport connect timeout.
    pub connect_timeout_secs: u64,
    /// Transport overall request timeout.
    pub read_timeout_secs: u64,
    /// Transport-level retries after the first attempt.
    pub max_retries: u32,
    /// Error log location; `<output_root>/errors.log` when unset.
    pub error_log: Option<PathBuf>,
    /// Exit non-zero when any job fails.
    pub fail_on_errors: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            commission: DEFAULT_COMMISSION,
            legislatures: vec![DEFAULT_LEGISLATURE],
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            download_label: DEFAULT_DOWNLOAD_LABEL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            start_year: None,
            end_year: None,
            classifier: Classifier::default(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            error_log: None,
            fail_on_errors: false,
        }
    }
}

impl ScrapeConfig {
    /// Overlays every value present in `file`.
    #[must_use]
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if let Some(base_url) = &file.base_url {
            self.base_url.clone_from(base_url);
        }
        if let Some(commission) = file.commission {
            self.commission = commission;
        }
        if let Some(legislatures) = &file.legislatures {
            self.legislatures.clone_from(legislatures);
        }
        if let Some(output_root) = &file.output_root {
            self.output_root.clone_from(output_root);
        }
        if let Some(label) = &file.download_label {
            self.download_label.clone_from(label);
        }
        if let Some(concurrency) = file.concurrency {
            self.concurrency = concurrency;
        }
        if file.start_year.is_some() {
            self.start_year = file.start_year;
        }
        if file.end_year.is_some() {
            self.end_year = file.end_year;
        }
        if let Some(section) = &file.classifier {
            self.classifier = Classifier::new(section.rules.clone());
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(secs) = file.read_timeout_secs {
            self.read_timeout_secs = secs;
        }
        if let Some(retries) = file.max_retries {
            self.max_retries = retries;
        }
        if file.error_log.is_some() {
            self.error_log.clone_from(&file.error_log);
        }
        if let Some(fail) = file.fail_on_errors {
            self.fail_on_errors = fail;
        }
        self
    }

    /// Checks ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::invalid(
                "base_url",
                format!("{:?} is not an absolute URL", self.base_url),
            ));
        }
        if self.legislatures.is_empty() {
            return Err(ConfigError::invalid(
                "legislatures",
                "at least one legislature is required",
            ));
        }
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::invalid(
                "concurrency",
                format!(
                    "{} is outside {MIN_CONCURRENCY}..={MAX_CONCURRENCY}",
                    self.concurrency
                ),
            ));
        }
        if self.download_label.trim().is_empty() {
            return Err(ConfigError::invalid("download_label", "must not be empty"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid("connect_timeout_secs", "must be > 0"));
        }
        if self.read_timeout_secs == 0 {
            return Err(ConfigError::invalid("read_timeout_secs", "must be > 0"));
        }
        if let (Some(start), Some(end)) = (self.start_year, self.end_year)
            && start > end
        {
            return Err(ConfigError::invalid(
                "start_year",
                format!("start year {start} is after end year {end}"),
            ));
        }
        Ok(())
    }

    /// Creates the output root if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutputRoot`] when the directory cannot be created.
    pub fn prepare_output_root(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.output_root).map_err(|source| ConfigError::OutputRoot {
            path: self.output_root.clone(),
            source,
        })
    }

    /// Where failures are appended.
    #[must_use]
    pub fn error_log_path(&self) -> PathBuf {
        self.error_log
            .clone()
            .unwrap_or_else(|| self.output_root.join(ERROR_LOG_FILE_NAME))
    }

    /// Returns true when `year` passes the year filter.
    #[must_use]
    pub fn includes_year(&self, year: i32) -> bool {
        self.start_year.is_none_or(|start| year >= start)
            && self.end_year.is_none_or(|end| year <= end)
    }

    /// Legislature index page listing the available archive months.
    #[must_use]
    pub fn index_url(&self, legislature: u32) -> String {
        format!(
            "{}/leg{legislature}/{ARCHIVE_PAGE_ID}?commissione={}",
            self.base_url.trim_end_matches('/'),
            self.commission
        )
    }

    /// Archive page for one month.
    #[must_use]
    pub fn month_url(&self, legislature: u32, period: Period) -> String {
        format!(
            "{}/leg{legislature}/{ARCHIVE_PAGE_ID}?commissione={}&annomese={}&view=f",
            self.base_url.trim_end_matches('/'),
            self.commission,
            period.annomese()
        )
    }
}

/// `[classifier]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierSection {
    /// Replacement rule table, evaluated top to bottom.
    #[serde(default)]
    pub rules: Vec<ClassifierRule>,
}

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Site root.
    pub base_url: Option<String>,
    /// Commission identifier.
    pub commission: Option<u32>,
    /// Legislatures to process.
    pub legislatures: Option<Vec<u32>>,
    /// Output root.
    pub output_root: Option<PathBuf>,
    /// Download anchor text.
    pub download_label: Option<String>,
    /// Concurrent downloads.
    pub concurrency: Option<usize>,
    /// Earliest year kept.
    pub start_year: Option<i32>,
    /// Latest year kept.
    pub end_year: Option<i32>,
    /// Classifier rule table.
    pub classifier: Option<ClassifierSection>,
    /// Transport connect timeout.
    pub connect_timeout_secs: Option<u64>,
    /// Transport request timeout.
    pub read_timeout_secs: Option<u64>,
    /// Transport retries.
    pub max_retries: Option<u32>,
    /// Error log path.
    pub error_log: Option<PathBuf>,
    /// Exit non-zero on failures.
    pub fail_on_errors: Option<bool>,
}

impl FileConfig {
    /// Parses a config file body.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Loads the config at the default location, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when a file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.exists() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/camera-pdfs/config.toml`
/// 2. `$HOME/.config/camera-pdfs/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("camera-pdfs")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("camera-pdfs")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
