// src/pipeline/fetch.rs

//! Feed retrieval.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::FeedConfig;
use crate::pipeline::Workspace;
use crate::utils::format_size;
use crate::utils::http::{create_async_client, describe_error};
use crate::utils::log::RunLog;

/// File name of the raw feed inside the working area.
pub const FEED_FILE: &str = "feed.csv";

/// Source of the raw feed body.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieve the complete body at `url` in a single attempt.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Extra attempts after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl From<&FeedConfig> for RetryPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            retries: config.retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Feed source backed by a `reqwest` client.
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
}

impl HttpFeedSource {
    /// Create a source from feed settings.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            timeout_secs: config.timeout_secs,
            max_bytes: config.max_bytes,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, describe_error(&e, self.timeout_secs)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP status {}", status)));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::fetch(url, describe_error(&e, self.timeout_secs)))?
        {
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(AppError::fetch(
                    url,
                    format!("response exceeds {} byte limit", self.max_bytes),
                ));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Fetch the feed into the working area, returning the file path.
///
/// Every failed attempt is written to the run log; only the last one is
/// returned as an error.
pub async fn run_fetch(
    source: &dyn FeedSource,
    url: &str,
    retry: RetryPolicy,
    workspace: &Workspace,
    log: &mut RunLog,
) -> Result<(PathBuf, u64)> {
    log.info(format!("Downloading feed from {}", url));
    let attempts = retry.retries + 1;
    let mut attempt = 1;
    let body = loop {
        match source.fetch(url).await {
            Ok(body) => break body,
            Err(e) if attempt < attempts => {
                log.warn(format!(
                    "Fetch attempt {}/{} failed: {}",
                    attempt, attempts, e
                ));
                attempt += 1;
                tokio::time::sleep(retry.delay).await;
            }
            Err(e) => return Err(e),
        }
    };
    let size = body.len() as u64;
    let path = workspace.write(FEED_FILE, &body).await?;
    log.info(format!("Downloaded {} ({} bytes)", format_size(size), size));
    Ok((path, size))
}
