// src/error.rs

//! Unified error handling for the feed updater.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for updater operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Feed could not be retrieved
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Feed could not be parsed
    #[error("Extract failed: {0}")]
    Extract(String),

    /// Existing snapshot could not be preserved
    #[error("Backup of {path} failed: {message}")]
    Backup { path: String, message: String },

    /// New snapshot could not be swapped in
    #[error("Publish to {path} failed: {message}")]
    Publish { path: String, message: String },

    /// Empty result would replace a non-empty snapshot
    #[error("Refusing to replace {previous_count} published entries with an empty result")]
    EmptyResult { previous_count: usize },

    /// Entry count dropped past the configured threshold
    #[error(
        "Publish guard triggered: {previous_count} -> {current_count} entries ({drop_percent:.1}% drop > {threshold_percent}%)"
    )]
    GuardTriggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// Another run holds the lock
    #[error("Another run holds the lock at {0}")]
    Locked(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for the given feed URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extract error.
    pub fn extract(message: impl Into<String>) -> Self {
        Self::Extract(message.into())
    }

    /// Create a backup error for the snapshot at `path`.
    pub fn backup(path: &Path, message: impl fmt::Display) -> Self {
        Self::Backup {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a publish error for the snapshot at `path`.
    pub fn publish(path: &Path, message: impl fmt::Display) -> Self {
        Self::Publish {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Pipeline stage that produced this error, if any.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Fetch { .. } => Some("fetch"),
            Self::Extract(_) => Some("extract"),
            Self::Backup { .. } => Some("backup"),
            Self::Publish { .. } | Self::EmptyResult { .. } | Self::GuardTriggered { .. } => {
                Some("publish")
            }
            _ => None,
        }
    }
}
