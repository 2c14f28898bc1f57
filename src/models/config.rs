//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote feed and HTTP behavior settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Data directory layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Publish guard thresholds
    #[serde(default)]
    pub guard: GuardConfig,

    /// Backup retention policy
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `PHISHFEED_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment or equivalent).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(env::FEED_URL) {
            self.feed.url = url;
        }
        if let Some(dir) = lookup(env::DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(env::FETCH_TIMEOUT_SECS) {
            self.feed.timeout_secs = secs.trim().parse().map_err(|_| {
                AppError::config(format!("{} must be an integer, got {secs:?}", env::FETCH_TIMEOUT_SECS))
            })?;
        }
        if let Some(count) = lookup(env::MAX_BACKUPS) {
            self.retention.max_backups = count.trim().parse().map_err(|_| {
                AppError::config(format!("{} must be an integer, got {count:?}", env::MAX_BACKUPS))
            })?;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.feed.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "feed.url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.feed.user_agent.trim().is_empty() {
            return Err(AppError::validation("feed.user_agent is empty"));
        }
        if self.feed.timeout_secs == 0 {
            return Err(AppError::validation("feed.timeout_secs must be > 0"));
        }
        if self.feed.connect_timeout_secs == 0 {
            return Err(AppError::validation("feed.connect_timeout_secs must be > 0"));
        }
        if self.feed.max_bytes == 0 {
            return Err(AppError::validation("feed.max_bytes must be > 0"));
        }
        if self.feed.url_column == 0 {
            return Err(AppError::validation("feed.url_column is 1-based and must be > 0"));
        }
        if self.feed.delimiter == self.feed.quote {
            return Err(AppError::validation("feed.delimiter and feed.quote must differ"));
        }
        for (field, name) in [
            ("storage.snapshot_file", &self.storage.snapshot_file),
            ("storage.run_log", &self.storage.run_log),
            ("storage.summary_file", &self.storage.summary_file),
            ("storage.lock_file", &self.storage.lock_file),
        ] {
            let name = name.trim();
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(AppError::validation(format!(
                    "{} must be a plain file name, got {:?}",
                    field, name
                )));
            }
        }
        if self.guard.max_drop_percent > 100 {
            return Err(AppError::validation("guard.max_drop_percent must be <= 100"));
        }
        if self.retention.max_age_days == Some(0) {
            return Err(AppError::validation("retention.max_age_days must be > 0"));
        }
        Ok(())
    }
}

/// Environment variable names recognized by [`Config::apply_env`].
pub mod env {
    pub const FEED_URL: &str = "PHISHFEED_FEED_URL";
    pub const DATA_DIR: &str = "PHISHFEED_DATA_DIR";
    pub const FETCH_TIMEOUT_SECS: &str = "PHISHFEED_FETCH_TIMEOUT_SECS";
    pub const MAX_BACKUPS: &str = "PHISHFEED_MAX_BACKUPS";
}

/// Remote feed location, HTTP behavior and tabular layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed endpoint
    #[serde(default = "defaults::feed_url")]
    pub url: String,

    /// User-Agent header for the feed request
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Total request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Largest accepted response body
    #[serde(default = "defaults::max_bytes")]
    pub max_bytes: u64,

    /// Extra attempts after a failed fetch
    #[serde(default)]
    pub retries: u32,

    /// Delay between fetch attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// 1-based column holding the URL
    #[serde(default = "defaults::url_column")]
    pub url_column: usize,

    /// Field delimiter
    #[serde(default = "defaults::delimiter")]
    pub delimiter: char,

    /// Quote character stripped from the extracted field
    #[serde(default = "defaults::quote")]
    pub quote: char,

    /// Whether the first row is a header to discard
    #[serde(default = "defaults::has_header")]
    pub has_header: bool,
}

impl FeedConfig {
    /// Tabular layout used by the extractor.
    pub fn format(&self) -> FeedFormat {
        FeedFormat {
            column: self.url_column.saturating_sub(1),
            delimiter: self.delimiter,
            quote: self.quote,
            has_header: self.has_header,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: defaults::feed_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            max_bytes: defaults::max_bytes(),
            retries: 0,
            retry_delay_ms: defaults::retry_delay(),
            url_column: defaults::url_column(),
            delimiter: defaults::delimiter(),
            quote: defaults::quote(),
            has_header: defaults::has_header(),
        }
    }
}

/// Expected layout of the feed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedFormat {
    /// 0-based column index
    pub column: usize,
    pub delimiter: char,
    pub quote: char,
    pub has_header: bool,
}

impl Default for FeedFormat {
    fn default() -> Self {
        FeedConfig::default().format()
    }
}

/// Data directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the snapshot, backups, run log and lock
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Published snapshot file name
    #[serde(default = "defaults::snapshot_file")]
    pub snapshot_file: String,

    /// Append-only run log file name
    #[serde(default = "defaults::run_log")]
    pub run_log: String,

    /// JSON summary of the last run
    #[serde(default = "defaults::summary_file")]
    pub summary_file: String,

    /// Run lock file name
    #[serde(default = "defaults::lock_file")]
    pub lock_file: String,

    /// Age after which an abandoned lock is ignored
    #[serde(default = "defaults::stale_lock")]
    pub stale_lock_secs: u64,
}

impl StorageConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.run_log)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.data_dir.join(&self.summary_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(&self.lock_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            snapshot_file: defaults::snapshot_file(),
            run_log: defaults::run_log(),
            summary_file: defaults::summary_file(),
            lock_file: defaults::lock_file(),
            stale_lock_secs: defaults::stale_lock(),
        }
    }
}

/// Thresholds checked before a new snapshot replaces the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Allow an empty result to replace a non-empty snapshot
    #[serde(default)]
    pub allow_empty: bool,

    /// Allow an empty result when nothing has been published yet
    #[serde(default = "defaults::allow_cold_start")]
    pub allow_cold_start: bool,

    /// Maximum allowed drop percentage (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous entry count below which the drop check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            allow_empty: false,
            allow_cold_start: defaults::allow_cold_start(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Backup pruning policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Newest backups to keep; 0 keeps all
    #[serde(default = "defaults::max_backups")]
    pub max_backups: usize,

    /// Delete backups older than this many days
    #[serde(default)]
    pub max_age_days: Option<u64>,
}

impl RetentionConfig {
    /// Policy that never deletes anything.
    pub fn unbounded() -> Self {
        Self {
            max_backups: 0,
            max_age_days: None,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_backups: defaults::max_backups(),
            max_age_days: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Feed defaults
    pub fn feed_url() -> String {
        "http://data.phishtank.com/data/online-valid.csv".into()
    }
    pub fn user_agent() -> String {
        "phishfeed/0.1 (+phishing URL snapshot updater)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn max_bytes() -> u64 {
        256 * 1024 * 1024
    }
    pub fn retry_delay() -> u64 {
        5_000
    }
    pub fn url_column() -> usize {
        2
    }
    pub fn delimiter() -> char {
        ','
    }
    pub fn quote() -> char {
        '"'
    }
    pub fn has_header() -> bool {
        true
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data/phishtank")
    }
    pub fn snapshot_file() -> String {
        "phishing_urls.txt".into()
    }
    pub fn run_log() -> String {
        "update.log".into()
    }
    pub fn summary_file() -> String {
        "last_run.json".into()
    }
    pub fn lock_file() -> String {
        ".phishfeed.lock".into()
    }
    pub fn stale_lock() -> u64 {
        6 * 60 * 60
    }

    // Guard defaults
    pub fn allow_cold_start() -> bool {
        true
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        100
    }

    // Retention defaults
    pub fn max_backups() -> usize {
        30
    }
}
