// src/models/run.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one updater run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Statistics for one run, persisted as the last-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub feed_url: String,

    /// Raw feed size
    pub fetched_bytes: u64,
    /// Rows extracted after the header
    pub candidates: usize,
    /// Candidates dropped as blank
    pub blank: usize,
    /// Candidates dropped as duplicates
    pub duplicates: usize,
    /// Entries in the new snapshot
    pub entries: usize,
    /// Entries in the snapshot this run replaced
    pub previous_entries: Option<usize>,

    pub backup: Option<PathBuf>,
    pub pruned_backups: usize,

    pub snapshot_bytes: u64,
    pub snapshot_sha256: Option<String>,

    /// Failing stage, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(feed_url: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            feed_url: feed_url.into(),
            fetched_bytes: 0,
            candidates: 0,
            blank: 0,
            duplicates: 0,
            entries: 0,
            previous_entries: None,
            backup: None,
            pruned_backups: 0,
            snapshot_bytes: 0,
            snapshot_sha256: None,
            failed_stage: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
