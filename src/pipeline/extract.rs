// src/pipeline/extract.rs

//! URL column extraction from the delimited feed.
//!
//! This is a plain column split, not a CSV parser: a delimiter inside a
//! quoted field still splits the field.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::FeedFormat;
use crate::pipeline::Workspace;
use crate::utils::log::RunLog;

/// File name of the extracted candidates inside the working area.
pub const CANDIDATES_FILE: &str = "candidates.txt";

const BOM: char = '\u{feff}';

/// Pull the designated column from every data row, in file order.
pub fn extract_candidates(raw: &str, format: &FeedFormat) -> Result<Vec<String>> {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);
    if raw.trim().is_empty() {
        return Err(AppError::extract("feed is empty"));
    }

    let skip = usize::from(format.has_header);
    let mut candidates = Vec::new();
    for (index, line) in raw.lines().enumerate().skip(skip) {
        if line.is_empty() {
            continue;
        }
        let field = line.split(format.delimiter).nth(format.column).ok_or_else(|| {
            AppError::extract(format!(
                "line {}: column {} not found",
                index + 1,
                format.column + 1
            ))
        })?;
        candidates.push(field.chars().filter(|c| *c != format.quote).collect());
    }
    Ok(candidates)
}

/// Extract candidates from the fetched feed and record them in the working area.
pub async fn run_extract(
    feed_path: &Path,
    format: &FeedFormat,
    workspace: &Workspace,
    log: &mut RunLog,
) -> Result<Vec<String>> {
    let bytes = tokio::fs::read(feed_path).await?;
    let raw = String::from_utf8(bytes)
        .map_err(|e| AppError::extract(format!("feed is not valid UTF-8: {}", e)))?;

    let candidates = extract_candidates(&raw, format)?;

    let mut listing = String::with_capacity(raw.len());
    for candidate in &candidates {
        listing.push_str(candidate);
        listing.push('\n');
    }
    workspace.write(CANDIDATES_FILE, listing.as_bytes()).await?;

    log.info(format!("Extracted {} candidate URLs", candidates.len()));
    Ok(candidates)
}
