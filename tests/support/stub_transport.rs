//! Scripted in-process `Transport`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use camera_pdfs::{FetchError, PageResponse, Transport};

/// Scripted answer for one URL.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Page with status and body.
    Page(u16, String),
    /// Document body.
    Document(Vec<u8>),
    /// Connection-level failure.
    ConnectionError,
}

/// Unscripted URLs answer 404. Tracks how many fetches overlap.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: HashMap<String, Reply>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reply(mut self, url: impl Into<String>, reply: Reply) -> Self {
        self.replies.insert(url.into(), reply);
        self
    }

    pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.reply(url, Reply::Page(200, body.into()))
    }

    pub fn document(self, url: impl Into<String>, body: &[u8]) -> Self {
        self.reply(url, Reply::Document(body.to_vec()))
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }

    async fn enter(&self, url: &str) -> Option<Reply> {
        self.requests.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.replies.get(url).cloned()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get_page(&self, url: &str) -> Result<PageResponse, FetchError> {
        let page = |status: u16, body: String| PageResponse {
            status,
            body,
            final_url: url.to_string(),
        };
        match self.enter(url).await {
            Some(Reply::Page(status, body)) => Ok(page(status, body)),
            Some(Reply::Document(_)) => Ok(page(200, String::new())),
            Some(Reply::ConnectionError) => Err(FetchError::timeout(url)),
            None => Ok(page(404, String::new())),
        }
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        match self.enter(url).await {
            Some(Reply::Document(body)) => {
                std::fs::write(dest, &body).map_err(|e| FetchError::io(dest, e))?;
                Ok(body.len() as u64)
            }
            Some(Reply::Page(status, _)) if status >= 400 => {
                Err(FetchError::http_status(url, status))
            }
            Some(Reply::Page(_, body)) => {
                std::fs::write(dest, body.as_bytes()).map_err(|e| FetchError::io(dest, e))?;
                Ok(body.len() as u64)
            }
            Some(Reply::ConnectionError) => Err(FetchError::timeout(url)),
            None => Err(FetchError::http_status(url, 404)),
        }
    }
}
