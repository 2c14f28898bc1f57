// src/pipeline/normalize.rs

//! Blank removal, deduplication and canonical ordering.

use crate::error::Result;
use crate::models::{Entry, EntrySet};
use crate::pipeline::Workspace;
use crate::utils::log::RunLog;

/// File name of the canonical entry set inside the working area.
pub const ENTRIES_FILE: &str = "entries.txt";

/// Counts reported by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub candidates: usize,
    pub blank: usize,
    pub duplicates: usize,
    pub entries: usize,
}

/// Trim, drop blanks, deduplicate and sort.
pub fn normalize<S: AsRef<str>>(candidates: &[S]) -> (EntrySet, NormalizeStats) {
    let mut set = EntrySet::new();
    let mut stats = NormalizeStats {
        candidates: candidates.len(),
        ..NormalizeStats::default()
    };

    for candidate in candidates {
        match Entry::parse(candidate.as_ref()) {
            Some(entry) => {
                if !set.insert(entry) {
                    stats.duplicates += 1;
                }
            }
            None => stats.blank += 1,
        }
    }

    stats.entries = set.len();
    (set, stats)
}

/// Normalize candidates and record the canonical set in the working area.
pub async fn run_normalize(
    candidates: &[String],
    workspace: &Workspace,
    log: &mut RunLog,
) -> Result<(EntrySet, NormalizeStats)> {
    let (entries, stats) = normalize(candidates);
    workspace.write(ENTRIES_FILE, &entries.to_snapshot_bytes()).await?;

    log.info(format!(
        "Normalized {} candidates into {} unique entries ({} blank, {} duplicate)",
        stats.candidates, stats.entries, stats.blank, stats.duplicates
    ));
    if entries.is_empty() {
        log.warn("Normalized entry set is empty");
    }
    Ok((entries, stats))
}
