// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// GET `url` and return the body as text.
///
/// No retry here; the synchronizer decides what a failure means.
pub async fn fetch(client: &reqwest::Client, url: &str) -> std::result::Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::ConnectionFailed {
            url: url.to_string(),
            message: format!("HTTP {status}"),
        });
    }

    response.text().await.map_err(|e| classify(url, e))
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::ConnectionFailed {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
