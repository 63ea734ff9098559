//! In-memory transport for driving probing and scheduling logic in unit tests.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::http::{HttpTransport, ProbeOutcome};

#[derive(Debug, Default)]
pub struct FakeTransport {
    existing: HashSet<String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    probes: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetch_delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `{template}/1.jpg` through `{template}/{pages}.jpg`.
    pub fn with_pages(mut self, template: &str, pages: u32) -> Self {
        for page in 1..=pages {
            self.existing.insert(format!("{template}/{page}.jpg"));
        }
        self
    }

    /// Makes fetches of `url` fail with a timeout.
    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    /// Makes fetches of `url` panic inside the download task.
    pub fn panicking(mut self, url: impl Into<String>) -> Self {
        self.panicking.insert(url.into());
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.probes.lock().unwrap().push(url.to_string());
        if self.existing.contains(url) {
            ProbeOutcome::Exists
        } else {
            ProbeOutcome::NotFound(404)
        }
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        _referer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if self.panicking.contains(url) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("transport blew up on {url}");
        }

        let result = if self.failing.contains(url) {
            Err(FetchError::Timeout {
                url: url.to_string(),
            })
        } else if !self.existing.contains(url) {
            Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
        } else {
            tokio::fs::write(dest, url.as_bytes())
                .await
                .map(|_| url.len() as u64)
                .map_err(|e| FetchError::io(dest, e))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
