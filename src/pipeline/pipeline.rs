// src/pipeline/pipeline.rs

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, EntrySet, RunStatus, RunSummary};
use crate::storage::{LocalSnapshotStore, RunLock, SnapshotStore};
use crate::utils::format_size;
use crate::utils::log::RunLog;

use super::extract::run_extract;
use super::fetch::{FeedSource, HttpFeedSource, RetryPolicy, run_fetch};
use super::guard::PublishGuard;
use super::normalize::run_normalize;
use super::workspace::Workspace;

const TOTAL_STEPS: usize = 5;

/// Per-invocation options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip the publish guard
    pub force: bool,
    /// Run start; names the backup taken by this run
    pub started_at: DateTime<Local>,
}

impl RunOptions {
    pub fn now() -> Self {
        Self {
            force: false,
            started_at: Local::now(),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::now()
    }
}

/// Run one update against the configured feed and data directory.
///
/// Opens the run log, takes the run lock and drives [`run_pipeline`] with the
/// HTTP source and the local snapshot store.
pub async fn run_update(config: &Config, options: &RunOptions) -> Result<RunSummary> {
    let mut log = RunLog::open(config.storage.run_log_path());

    let prepared = config.validate().and_then(|()| {
        let lock = RunLock::acquire(
            config.storage.lock_path(),
            Duration::from_secs(config.storage.stale_lock_secs),
        )?;
        let source = HttpFeedSource::new(&config.feed)?;
        let store = LocalSnapshotStore::new(&config.storage)?;
        Ok((lock, source, store))
    });
    let (_lock, source, store) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            log.error(format!("Update not started: {}", e));
            return Err(e);
        }
    };

    run_pipeline(config, &source, &store, &mut log, options).await
}

/// Apply the retention policy outside a run.
///
/// Takes the run lock so backups are never pruned while an update is in
/// progress.
pub async fn run_prune(config: &Config, now: DateTime<Local>) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let _lock = RunLock::acquire(
        config.storage.lock_path(),
        Duration::from_secs(config.storage.stale_lock_secs),
    )?;
    let store = LocalSnapshotStore::new(&config.storage)?;
    store.prune_backups(&config.retention, now).await
}

/// Run the full pipeline: Fetch → Extract → Normalize → Backup → Publish.
///
/// The snapshot is only touched by the final atomic rename, so any error
/// leaves the previously published snapshot in place. The run summary is
/// persisted whether or not the run succeeds.
pub async fn run_pipeline(
    config: &Config,
    source: &dyn FeedSource,
    store: &dyn SnapshotStore,
    log: &mut RunLog,
    options: &RunOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(&config.feed.url, options.started_at.with_timezone(&Utc));
    log.info(format!(
        "Starting update of {} from {}",
        store.snapshot_path().display(),
        config.feed.url
    ));

    let result = match Workspace::create_in(&config.storage.data_dir) {
        Ok(workspace) => {
            let result =
                run_stages(config, source, store, &workspace, log, options, &mut summary).await;
            if let Err(e) = workspace.close() {
                log.warn(format!("Failed to remove working area: {}", e));
            }
            result
        }
        Err(e) => Err(e),
    };

    summary.finished_at = Some(Utc::now());
    match &result {
        Ok(()) => {
            summary.status = RunStatus::Success;
            report_success(&summary, log);
        }
        Err(e) => {
            summary.status = RunStatus::Failed;
            summary.failed_stage = e.stage().map(str::to_string);
            summary.error = Some(e.to_string());
            log.error(format!("Update aborted: {}", e));
            log.info("Published snapshot left unchanged");
        }
    }

    if let Err(e) = store.save_summary(&summary).await {
        log.warn(format!("Failed to save run summary: {}", e));
    }

    result.map(|()| summary)
}

async fn run_stages(
    config: &Config,
    source: &dyn FeedSource,
    store: &dyn SnapshotStore,
    workspace: &Workspace,
    log: &mut RunLog,
    options: &RunOptions,
    summary: &mut RunSummary,
) -> Result<()> {
    log.step(1, TOTAL_STEPS, "Fetch");
    let retry = RetryPolicy::from(&config.feed);
    let (feed_path, fetched_bytes) =
        run_fetch(source, &config.feed.url, retry, workspace, log).await?;
    summary.fetched_bytes = fetched_bytes;

    log.step(2, TOTAL_STEPS, "Extract");
    let candidates = run_extract(&feed_path, &config.feed.format(), workspace, log).await?;
    summary.candidates = candidates.len();

    log.step(3, TOTAL_STEPS, "Normalize");
    let (entries, stats) = run_normalize(&candidates, workspace, log).await?;
    summary.blank = stats.blank;
    summary.duplicates = stats.duplicates;
    summary.entries = stats.entries;

    log.step(4, TOTAL_STEPS, "Backup");
    let previous = store.load_current().await.map_err(|e| {
        AppError::backup(
            store.snapshot_path(),
            format!("cannot read published snapshot: {}", e),
        )
    })?;
    summary.previous_entries = previous.as_ref().map(EntrySet::len);
    check_guard(
        config,
        options,
        entries.len(),
        summary.previous_entries.unwrap_or(0),
        log,
    )?;

    match store.backup_current(options.started_at).await? {
        Some(path) => {
            log.info(format!("Backed up existing snapshot to {}", path.display()));
            summary.backup = Some(path);
        }
        None => log.info("No existing snapshot; skipping backup"),
    }

    log.step(5, TOTAL_STEPS, "Publish");
    let info = store.publish(&entries).await?;
    log.info(format!(
        "Published {} entries to {}",
        info.entry_count,
        info.path.display()
    ));
    summary.snapshot_bytes = info.size_bytes;
    summary.snapshot_sha256 = Some(info.sha256);

    match store
        .prune_backups(&config.retention, options.started_at)
        .await
    {
        Ok(removed) => {
            for path in &removed {
                log.info(format!("Pruned backup {}", path.display()));
            }
            summary.pruned_backups = removed.len();
        }
        Err(e) => log.warn(format!("Backup pruning failed: {}", e)),
    }

    Ok(())
}

fn check_guard(
    config: &Config,
    options: &RunOptions,
    current_count: usize,
    previous_count: usize,
    log: &mut RunLog,
) -> Result<()> {
    if options.force {
        log.warn(format!(
            "Publish guard bypassed: {} entries replace {}",
            current_count, previous_count
        ));
        return Ok(());
    }

    let result = PublishGuard::with_config(config.guard.clone())
        .validate(current_count, previous_count)?;
    log.info(format!("Publish guard: {}", result.describe()));
    Ok(())
}

fn report_success(summary: &RunSummary, log: &mut RunLog) {
    let elapsed = summary
        .finished_at
        .map(|end| (end - summary.started_at).num_milliseconds().max(0))
        .unwrap_or(0);
    let backup = summary
        .backup
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string());

    log.summary(
        "Update complete",
        &[
            ("Entries", summary.entries.to_string()),
            (
                "Snapshot size",
                format!(
                    "{} ({} bytes)",
                    format_size(summary.snapshot_bytes),
                    summary.snapshot_bytes
                ),
            ),
            (
                "SHA-256",
                summary.snapshot_sha256.clone().unwrap_or_default(),
            ),
            ("Backup", backup),
            ("Pruned backups", summary.pruned_backups.to_string()),
            ("Elapsed", format!("{} ms", elapsed)),
        ],
    );
}
