//! Local filesystem storage implementation.
//!
//! Every file this store writes (snapshot, backup, summary) goes through
//! [`LocalSnapshotStore::write_atomic`]: the bytes land in a hidden temp file
//! in the target directory, are synced, and are then renamed over the target.
//! A reader of the target path sees either the old or the new content.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{EntrySet, RetentionConfig, RunSummary, StorageConfig};
use crate::storage::{BACKUP_STAMP_FORMAT, BackupFile, SnapshotInfo, SnapshotStore};
use crate::utils::sha256_hex;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    root_dir: PathBuf,
    snapshot_path: PathBuf,
    summary_path: PathBuf,
    stem: String,
    dot_ext: String,
    backup_pattern: Regex,
}

impl LocalSnapshotStore {
    /// Create a store for the layout described by `config`.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        Self::with_files(&config.data_dir, &config.snapshot_file, &config.summary_file)
    }

    /// Create a store rooted at `root_dir` with explicit file names.
    pub fn with_files(
        root_dir: impl Into<PathBuf>,
        snapshot_file: &str,
        summary_file: &str,
    ) -> Result<Self> {
        let root_dir = root_dir.into();
        let name = Path::new(snapshot_file);
        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AppError::config(format!("Invalid snapshot file name: {snapshot_file}")))?
            .to_string();
        let dot_ext = name
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let pattern = format!(
            r"^{}_backup_(\d{{8}}_\d{{6}})(?:_(\d+))?{}$",
            regex::escape(&stem),
            regex::escape(&dot_ext)
        );
        let backup_pattern = Regex::new(&pattern)
            .map_err(|e| AppError::config(format!("Invalid backup pattern {pattern}: {e}")))?;

        Ok(Self {
            snapshot_path: root_dir.join(snapshot_file),
            summary_path: root_dir.join(summary_file),
            root_dir,
            stem,
            dot_ext,
            backup_pattern,
        })
    }

    /// Backup file name for a timestamp and collision counter.
    pub fn backup_name(&self, stamp: &str, sequence: u32) -> String {
        if sequence == 0 {
            format!("{}_backup_{}{}", self.stem, stamp, self.dot_ext)
        } else {
            format!("{}_backup_{}_{}{}", self.stem, stamp, sequence, self.dot_ext)
        }
    }

    /// Parse a directory entry name as a backup of this snapshot.
    fn parse_backup(&self, file_name: &str) -> Option<(NaiveDateTime, u32)> {
        let caps = self.backup_pattern.captures(file_name)?;
        let taken_at = NaiveDateTime::parse_from_str(&caps[1], BACKUP_STAMP_FORMAT).ok()?;
        let sequence = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some((taken_at, sequence))
    }

    /// First unused backup path for `stamp`.
    async fn next_backup_path(&self, stamp: &str) -> std::io::Result<PathBuf> {
        let mut sequence = 0;
        loop {
            let candidate = self.root_dir.join(self.backup_name(stamp, sequence));
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            sequence += 1;
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
        let dir = path.parent().unwrap_or(self.root_dir.as_path());
        tokio::fs::create_dir_all(dir).await?;

        // Unique name; removed on drop if the write or rename fails or is cancelled.
        let (file, tmp_path) = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(dir)?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tmp_path.persist(path)?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Size and digest of the published snapshot, if any.
    pub async fn current_info(&self) -> Result<Option<SnapshotInfo>> {
        let Some(bytes) = Self::read_bytes(&self.snapshot_path).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(SnapshotInfo {
            path: self.snapshot_path.clone(),
            entry_count: EntrySet::from_snapshot(&text).len(),
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
        }))
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    async fn load_current(&self) -> Result<Option<EntrySet>> {
        match Self::read_bytes(&self.snapshot_path).await? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    AppError::validation(format!(
                        "{} is not valid UTF-8: {}",
                        self.snapshot_path.display(),
                        e
                    ))
                })?;
                Ok(Some(EntrySet::from_snapshot(&text)))
            }
            None => Ok(None),
        }
    }

    async fn backup_current(&self, taken_at: DateTime<Local>) -> Result<Option<PathBuf>> {
        let source = &self.snapshot_path;
        let exists = tokio::fs::try_exists(source)
            .await
            .map_err(|e| AppError::backup(source, e))?;
        if !exists {
            return Ok(None);
        }

        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| AppError::backup(source, e))?;
        let stamp = taken_at.format(BACKUP_STAMP_FORMAT).to_string();
        let target = self
            .next_backup_path(&stamp)
            .await
            .map_err(|e| AppError::backup(source, e))?;

        self.write_atomic(&target, &bytes)
            .await
            .map_err(|e| AppError::backup(source, e))?;

        log::debug!(
            "Backed up {} ({} bytes) to {}",
            source.display(),
            bytes.len(),
            target.display()
        );
        Ok(Some(target))
    }

    async fn publish(&self, entries: &EntrySet) -> Result<SnapshotInfo> {
        let path = &self.snapshot_path;
        let bytes = entries.to_snapshot_bytes();

        self.write_atomic(path, &bytes)
            .await
            .map_err(|e| AppError::publish(path, e))?;

        Ok(SnapshotInfo {
            path: path.clone(),
            entry_count: entries.len(),
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
        })
    }

    async fn list_backups(&self) -> Result<Vec<BackupFile>> {
        let mut dir = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some((taken_at, sequence)) = self.parse_backup(name) {
                backups.push(BackupFile {
                    path: entry.path(),
                    taken_at,
                    sequence,
                });
            }
        }

        backups.sort_by(|a, b| {
            a.taken_at
                .cmp(&b.taken_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        Ok(backups)
    }

    async fn prune_backups(
        &self,
        policy: &RetentionConfig,
        now: DateTime<Local>,
    ) -> Result<Vec<PathBuf>> {
        let backups = self.list_backups().await?;
        let total = backups.len();
        let max_age = policy
            .max_age_days
            .and_then(|days| i64::try_from(days).ok())
            .and_then(TimeDelta::try_days);
        let now = now.naive_local();

        let mut removed = Vec::new();
        for (i, backup) in backups.into_iter().enumerate() {
            let over_count = policy.max_backups > 0 && i + policy.max_backups < total;
            let too_old = max_age.is_some_and(|age| now - backup.taken_at > age);
            if !(over_count || too_old) {
                continue;
            }

            match tokio::fs::remove_file(&backup.path).await {
                Ok(()) => removed.push(backup.path),
                Err(e) => log::warn!("Failed to remove backup {}: {}", backup.path.display(), e),
            }
        }
        Ok(removed)
    }

    async fn save_summary(&self, summary: &RunSummary) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(summary)?;
        self.write_atomic(&self.summary_path, &bytes).await?;
        Ok(())
    }

    async fn load_summary(&self) -> Result<Option<RunSummary>> {
        match Self::read_bytes(&self.summary_path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
