// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FeedConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FeedConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?;
    Ok(client)
}

/// Describe a transport failure for the run log.
pub fn describe_error(err: &reqwest::Error, timeout_secs: u64) -> String {
    if err.is_timeout() {
        return format!("timed out after {}s", timeout_secs);
    }
    if err.is_connect() {
        return format!("connection failed: {}", err);
    }
    if let Some(status) = err.status() {
        return format!("HTTP status {}", status);
    }
    err.to_string()
}
