// src/models/mod.rs

//! Domain models for the feed updater.

mod config;
mod entry;
mod run;

// Re-export all public types
pub use config::{
    Config, FeedConfig, FeedFormat, GuardConfig, RetentionConfig, StorageConfig, env,
};
pub use entry::{Entry, EntrySet};
pub use run::{RunStatus, RunSummary};
