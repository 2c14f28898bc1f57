// src/pipeline/workspace.rs

//! Scoped working area for one run.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Private directory holding a run's intermediate files.
///
/// Removed by [`Workspace::close`]; dropping it without closing removes it
/// too, so early returns do not leak files.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh `.phishfeed-run-*` directory under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(".phishfeed-run-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one artifact into the working area.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove the working area, reporting any failure.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}
