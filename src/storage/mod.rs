//! Storage abstractions for the published snapshot.
//!
//! The data directory is the only state shared between runs:
//!
//! ```text
//! data/phishtank/
//! ├── phishing_urls.txt                          # Published snapshot
//! ├── phishing_urls_backup_20261018_030000.txt   # Backups (one per replace)
//! ├── update.log                                 # Append-only run log
//! ├── last_run.json                              # Summary of the last run
//! └── .phishfeed.lock                            # Held while a run is active
//! ```

pub mod local;
pub mod lock;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{EntrySet, RetentionConfig, RunSummary};

// Re-export for convenience
pub use local::LocalSnapshotStore;
pub use lock::RunLock;

/// Timestamp format embedded in backup names.
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Metadata about a published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub entry_count: usize,
    pub size_bytes: u64,
    pub sha256: String,
}

/// A backup file discovered in the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    /// Timestamp embedded in the file name
    pub taken_at: NaiveDateTime,
    /// Collision counter for backups taken within the same second
    pub sequence: u32,
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Path readers consume.
    fn snapshot_path(&self) -> &Path;

    /// Load the published snapshot, if one exists.
    async fn load_current(&self) -> Result<Option<EntrySet>>;

    /// Copy the published snapshot to a backup named with `taken_at`.
    ///
    /// Returns `None` when there is nothing to back up.
    async fn backup_current(&self, taken_at: DateTime<Local>) -> Result<Option<PathBuf>>;

    /// Atomically replace the published snapshot.
    async fn publish(&self, entries: &EntrySet) -> Result<SnapshotInfo>;

    /// Backups ordered oldest first.
    async fn list_backups(&self) -> Result<Vec<BackupFile>>;

    /// Delete backups outside the retention policy, returning removed paths.
    async fn prune_backups(
        &self,
        policy: &RetentionConfig,
        now: DateTime<Local>,
    ) -> Result<Vec<PathBuf>>;

    /// Persist the summary of a run.
    async fn save_summary(&self, summary: &RunSummary) -> Result<()>;

    /// Load the summary of the last run.
    async fn load_summary(&self) -> Result<Option<RunSummary>>;
}
