// src/config.rs

//! Configuration loading utilities.
//!
//! Layers, lowest to highest precedence: built-in defaults, the TOML file,
//! `PHISHFEED_*` environment variables. CLI flags are applied by the binary.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Load configuration from `path` and the environment.
///
/// A missing file falls back to defaults unless `required` is set; a file
/// that exists but does not parse is always an error.
pub fn load(path: &Path, required: bool) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?
    } else if required {
        return Err(AppError::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    } else {
        log::debug!("No config file at {}; using defaults", path.display());
        Config::default()
    };

    config.apply_env()?;
    Ok(config)
}
