//! reqwest-backed [`Transport`] implementation.
//!
//! Timeouts bound every request; transient failures are retried according to
//! the client's [`RetryPolicy`] before an error is surfaced.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, classify_http_status};
use super::{FetchError, PageResponse, Transport};
use crate::user_agent;

/// HTTP client for archive pages and documents.
///
/// Created once and shared by every worker so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl HttpClient {
    /// Creates a client with default timeouts and retry policy.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_settings(
            CONNECT_TIMEOUT_SECS,
            READ_TIMEOUT_SECS,
            RetryPolicy::default(),
        )
    }

    /// Creates a client with explicit timeouts and retry policy.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn with_settings(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
        retry_policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self {
            client,
            retry_policy,
        })
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn get_page_once(&self, url: &str) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(PageResponse {
            status,
            body,
            final_url,
        })
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::http_status(url, response.status().as_u16()));
        }

        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        stream_to_file(file, response, url, dest).await
    }

    /// Sleeps for the retry delay and returns true, or returns false when the
    /// policy says to stop.
    async fn backoff(&self, url: &str, failure: FailureType, attempt: u32, cause: &str) -> bool {
        match self.retry_policy.should_retry(failure, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                info!(
                    url = %url,
                    attempt = next_attempt,
                    max_attempts = self.retry_policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    cause,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                true
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(url = %url, %reason, "not retrying request");
                false
            }
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn get_page(&self, url: &str) -> Result<PageResponse, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.get_page_once(url).await {
                Ok(page) => {
                    let failure = classify_http_status(page.status);
                    if page.is_success() || failure == FailureType::Permanent {
                        return Ok(page);
                    }
                    let cause = format!("HTTP {}", page.status);
                    if !self.backoff(url, failure, attempt, &cause).await {
                        return Ok(page);
                    }
                }
                Err(e) => {
                    if !self
                        .backoff(url, classify_error(&e), attempt, &e.to_string())
                        .await
                    {
                        return Err(e);
                    }
                }
            }
        }
    }

    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.download_once(url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if !self
                        .backoff(url, classify_error(&e), attempt, &e.to_string())
                        .await
                    {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Streams a response body to `file`, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;

    Ok(bytes_written)
}
