//! Page and document fetching.
//!
//! The rest of the crate talks to the network only through the [`Transport`]
//! trait, so discovery, scanning and downloading can be exercised against
//! in-process stubs. [`HttpClient`] is the reqwest-backed implementation.

mod client;
mod constants;
mod error;
mod retry;

use std::path::Path;

use async_trait::async_trait;

pub use client::HttpClient;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_http_status,
};

/// HTTP status the site uses for a month without an archive page.
pub const NOT_FOUND: u16 = 404;

/// A fetched HTML page.
///
/// Non-success statuses are returned rather than raised; callers decide
/// what a 404 means for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text (empty for error statuses the server sent none for).
    pub body: String,
    /// URL after redirects; relative links resolve against it.
    pub final_url: String,
}

impl PageResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true when the server said the page does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == NOT_FOUND
    }
}

/// Fetch capability consumed by discovery, scanning and the download engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches a page. Raises only on transport failure.
    async fn get_page(&self, url: &str) -> Result<PageResponse, FetchError>;

    /// Streams a document into `dest`, returning the number of bytes written.
    ///
    /// Non-success statuses raise [`FetchError::HttpStatus`]. `dest` is
    /// created or truncated; the caller owns its cleanup on failure.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}
