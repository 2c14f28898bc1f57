//! phishfeed CLI
//!
//! Entry point for scheduled runs (cron, systemd timers). Exits non-zero when
//! an update fails.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use phishfeed::{
    config,
    error::Result,
    models::Config,
    pipeline::{self, RunOptions},
    storage::{LocalSnapshotStore, SnapshotStore},
    utils::format_size,
};

const DEFAULT_CONFIG: &str = "phishfeed.toml";

/// phishfeed - PhishTank snapshot updater
#[derive(Parser, Debug)]
#[command(
    name = "phishfeed",
    version,
    about = "Fetches the PhishTank feed and publishes a deduplicated URL snapshot"
)]
struct Cli {
    /// Path to the TOML configuration file [default: phishfeed.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory holding the snapshot, backups and run log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Feed URL
    #[arg(long, global = true)]
    feed_url: Option<String>,

    /// Fetch timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the feed and publish a new snapshot
    Run {
        /// Publish even if the publish guard would refuse
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration
    Validate,

    /// Show the published snapshot, backups and last run
    Info,

    /// Delete backups outside the retention policy
    Prune,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve configuration: file, then environment, then CLI flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load(path, true)?,
        None => config::load(&PathBuf::from(DEFAULT_CONFIG), false)?,
    };

    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(url) = &cli.feed_url {
        config.feed.url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        config.feed.timeout_secs = secs;
    }
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    log::debug!("Data directory: {}", config.storage.data_dir.display());

    match cli.command {
        Command::Run { force } => {
            let options = RunOptions::now().with_force(force);
            let summary = pipeline::run_update(&config, &options).await?;
            log::info!(
                "Published {} entries ({})",
                summary.entries,
                format_size(summary.snapshot_bytes)
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            log::info!("Feed: {}", config.feed.url);
            log::info!("Snapshot: {}", config.storage.snapshot_path().display());
            log::info!("Run log: {}", config.storage.run_log_path().display());
        }

        Command::Info => {
            let store = LocalSnapshotStore::new(&config.storage)?;
            log::info!("Data directory: {}", config.storage.data_dir.display());

            match store.current_info().await? {
                Some(info) => {
                    log::info!("Snapshot: {}", info.path.display());
                    log::info!("Entries: {}", info.entry_count);
                    log::info!(
                        "Size: {} ({} bytes)",
                        format_size(info.size_bytes),
                        info.size_bytes
                    );
                    log::info!("SHA-256: {}", info.sha256);
                }
                None => log::info!("No snapshot published yet."),
            }

            let backups = store.list_backups().await?;
            log::info!("Backups: {}", backups.len());
            if let Some(latest) = backups.last() {
                log::info!("Latest backup: {}", latest.path.display());
            }

            match store.load_summary().await? {
                Some(summary) => {
                    log::info!(
                        "Last run: {:?} at {} ({})",
                        summary.status,
                        summary.started_at,
                        config.storage.summary_path().display()
                    );
                    if let Some(error) = &summary.error {
                        log::info!("Last error: {}", error);
                    }
                }
                None => log::info!("No run recorded yet."),
            }
        }

        Command::Prune => {
            let removed = pipeline::run_prune(&config, chrono::Local::now()).await?;
            for path in &removed {
                log::info!("Removed {}", path.display());
            }
            log::info!("Pruned {} backups", removed.len());
        }
    }

    Ok(())
}
