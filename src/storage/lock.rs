//! Run-level mutual exclusion.
//!
//! A run holds `.phishfeed.lock` in the data directory from start to finish.
//! The file is created with create-new semantics, so a second run started
//! while the first is active fails instead of racing it to the snapshot.
//!
//! Each holder writes a unique token into the file and only removes the file
//! on release while that token is still there. A stale lock is taken over by
//! renaming it aside, so only one contender can claim it.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::Utc;

use crate::error::{AppError, Result};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Held lock file; removed on drop if this holder still owns it.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    token: String,
}

impl RunLock {
    /// Acquire the lock at `path`.
    ///
    /// A lock file older than `stale_after` is assumed abandoned by a crashed
    /// run and is replaced.
    pub fn acquire(path: impl Into<PathBuf>, stale_after: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let token = new_token();
        match Self::create(&path, &token) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Self::take_over(path, token, stale_after)
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn take_over(path: PathBuf, token: String, stale_after: Duration) -> Result<Self> {
        let observed = match fs::read_to_string(&path) {
            Ok(content) => content,
            // Released since our first attempt.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Self::create_or_locked(&path, &token);
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        if !Self::is_stale(&path, stale_after)? {
            return Err(AppError::Locked(path.display().to_string()));
        }

        let aside = sibling(&path, &format!("stale-{}", token));
        match fs::rename(&path, &aside) {
            Ok(()) => {}
            // Another contender moved it first.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::Locked(path.display().to_string()));
            }
            Err(e) => return Err(AppError::Io(e)),
        }

        let moved = fs::read_to_string(&aside).unwrap_or_default();
        if moved != observed {
            // The lock was replaced after the staleness check; put it back.
            let restored = fs::hard_link(&aside, &path);
            let _ = fs::remove_file(&aside);
            return match restored {
                Ok(()) => Err(AppError::Locked(path.display().to_string())),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    Err(AppError::Locked(path.display().to_string()))
                }
                Err(e) => Err(AppError::Io(e)),
            };
        }

        if let Err(e) = fs::remove_file(&aside) {
            log::warn!("Failed to remove stale lock {}: {}", aside.display(), e);
        }
        log::warn!("Took over stale lock {}", path.display());
        Self::create_or_locked(&path, &token)
    }

    fn create_or_locked(path: &Path, token: &str) -> Result<Self> {
        Self::create(path, token).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => AppError::Locked(path.display().to_string()),
            _ => AppError::Io(e),
        })
    }

    fn create(path: &Path, token: &str) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "pid={}", std::process::id())?;
        writeln!(file, "started_at={}", Utc::now().to_rfc3339())?;
        writeln!(file, "token={}", token)?;
        Ok(Self {
            path: path.to_path_buf(),
            token: token.to_string(),
        })
    }

    fn is_stale(path: &Path, stale_after: Duration) -> Result<bool> {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(AppError::Io(e)),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age >= stale_after)
    }

    /// Whether the lock file on disk still carries this holder's token.
    pub fn is_held(&self) -> bool {
        let expected = format!("token={}", self.token);
        fs::read_to_string(&self.path)
            .map(|content| content.lines().any(|line| line == expected))
            .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.is_held() {
            log::warn!(
                "Lock {} is no longer ours; leaving it in place",
                self.path.display()
            );
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

fn new_token() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", std::process::id(), nanos, seq)
}

/// `<dir>/<file name>.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
