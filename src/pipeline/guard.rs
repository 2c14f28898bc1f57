//! Publish guard, a circuit breaker in front of the snapshot.
//!
//! Prevents a broken or truncated feed from wiping out the published list
//! by refusing to publish when the entry count collapses compared with the
//! snapshot currently on disk.
//!
//! ## Rules
//!
//! > An empty result never replaces a non-empty snapshot unless
//! > `allow_empty` is set. A drop larger than `max_drop_percent` aborts the
//! > publish once the previous snapshot reaches `min_baseline` entries.

use crate::error::{AppError, Result};
use crate::models::GuardConfig;

/// Circuit breaker for preventing bad snapshot updates.
#[derive(Debug, Clone)]
pub struct PublishGuard {
    config: GuardConfig,
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
    /// Safe to proceed with the publish
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// First run or previous snapshot below baseline
    ColdStart { current_count: usize },
    /// Drop threshold exceeded - abort publish
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Empty result over a non-empty snapshot - abort publish
    EmptyResult { previous_count: usize },
}

impl PublishGuard {
    /// Create a guard with default thresholds.
    pub fn new() -> Self {
        Self::with_config(GuardConfig::default())
    }

    /// Create a guard with custom thresholds.
    pub fn with_config(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Compare the new entry count with the published one.
    ///
    /// `previous_count` is 0 when nothing has been published.
    pub fn check(&self, current_count: usize, previous_count: usize) -> GuardResult {
        // Case 1: Empty current result
        if current_count == 0 {
            if previous_count == 0 && self.config.allow_cold_start {
                return GuardResult::ColdStart { current_count };
            }
            if self.config.allow_empty {
                return GuardResult::Safe {
                    current_count,
                    previous_count,
                };
            }
            return GuardResult::EmptyResult { previous_count };
        }

        // Case 2: Cold start (no previous data or below baseline)
        if previous_count < self.config.min_baseline {
            return GuardResult::ColdStart { current_count };
        }

        // Case 3: Check drop percentage
        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.config.max_drop_percent as f64 {
                return GuardResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        GuardResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Return Ok if safe, Err if the guard refuses the publish.
    pub fn validate(&self, current_count: usize, previous_count: usize) -> Result<GuardResult> {
        match self.check(current_count, previous_count) {
            GuardResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => Err(AppError::GuardTriggered {
                current_count,
                previous_count,
                drop_percent,
                threshold_percent: self.config.max_drop_percent,
            }),
            GuardResult::EmptyResult { previous_count } => {
                Err(AppError::EmptyResult { previous_count })
            }
            passed => Ok(passed),
        }
    }
}

impl Default for PublishGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardResult {
    /// One-line description for the run log.
    pub fn describe(&self) -> String {
        match self {
            GuardResult::Safe {
                current_count,
                previous_count,
            } => format!("SAFE ({} entries, was {})", current_count, previous_count),
            GuardResult::ColdStart { current_count } => format!(
                "COLD START ({} entries, first run or below baseline)",
                current_count
            ),
            GuardResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => format!(
                "TRIGGERED ({} -> {} entries, {:.1}% drop)",
                previous_count, current_count, drop_percent
            ),
            GuardResult::EmptyResult { previous_count } => {
                format!("EMPTY RESULT (would replace {} entries)", previous_count)
            }
        }
    }
}
