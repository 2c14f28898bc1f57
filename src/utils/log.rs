// src/utils/log.rs

//! Append-only run log with server-style timestamps.
//!
//! Every line has the form `[YYYY-MM-DD HH:MM:SS] message` and is mirrored
//! to the `log` facade. Write failures degrade to a single console warning;
//! they never abort a run.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Warn => "WARN: ",
            LogLevel::Error => "ERROR: ",
        }
    }
}

/// Format a run log line with a local timestamp.
pub fn format_line(level: LogLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}{}", timestamp, level.prefix(), message)
}

/// Durable, append-only record of one run.
///
/// Opened once per run and passed to each stage; the file closes when the
/// value is dropped.
pub struct RunLog {
    path: Option<PathBuf>,
    file: Option<File>,
    degraded: bool,
}

impl RunLog {
    /// Open (or create) the log at `path` in append mode.
    ///
    /// An unopenable log yields a console-only `RunLog`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open_file(&path) {
            Ok(file) => Self {
                path: Some(path),
                file: Some(file),
                degraded: false,
            },
            Err(e) => {
                log::warn!(
                    "Run log {} unavailable ({}); continuing without it",
                    path.display(),
                    e
                );
                Self {
                    path: Some(path),
                    file: None,
                    degraded: true,
                }
            }
        }
    }

    /// A log that only mirrors to the console.
    pub fn console() -> Self {
        Self {
            path: None,
            file: None,
            degraded: false,
        }
    }

    fn open_file(path: &Path) -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a write to the log file has failed during this run.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn write(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => log::info!("{}", message),
            LogLevel::Warn => log::warn!("{}", message),
            LogLevel::Error => log::error!("{}", message),
        }

        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = format_line(level, message);
        if let Err(e) = writeln!(file, "{}", line) {
            if !self.degraded {
                log::warn!("Run log write failed ({}); further lines are console-only", e);
            }
            self.degraded = true;
            self.file = None;
        }
    }

    /// Log an info message
    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message.as_ref());
    }

    /// Log a warning message
    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.write(LogLevel::Warn, message.as_ref());
    }

    /// Log an error message
    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write(LogLevel::Error, message.as_ref());
    }

    /// Log a step in a process
    pub fn step(&mut self, step_num: usize, total: usize, message: &str) {
        self.info(format!("[STEP {}/{}] {}", step_num, total, message));
    }

    /// Log a summary section
    pub fn summary(&mut self, title: &str, items: &[(&str, String)]) {
        self.info(format!("[SUMMARY] {}", title));
        for (key, value) in items {
            self.info(format!("    {}: {}", key, value));
        }
    }
}
