//! HTTP access to page images.
//!
//! The resolver, detector and downloader only talk to [`HttpTransport`], so the
//! probing and scheduling logic can be driven by an in-memory transport in tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::REFERER;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::config::BROWSER_USER_AGENT;
use crate::error::{CloneError, FetchError};

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    /// The server answered with a non-success status.
    NotFound(u16),
    /// Network error or timeout; the resource may or may not exist.
    TransientError(String),
}

impl ProbeOutcome {
    pub fn exists(&self) -> bool {
        matches!(self, ProbeOutcome::Exists)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Lightweight existence check against `url`.
    async fn probe(&self, url: &str) -> ProbeOutcome;

    /// Downloads `url` into `dest`, replacing any existing file. Returns the
    /// number of bytes written.
    async fn fetch_to_file(
        &self,
        url: &str,
        referer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, FetchError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(probe_timeout: Duration, fetch_timeout: Duration) -> Result<Self, CloneError> {
        let client = Client::builder().user_agent(BROWSER_USER_AGENT).build()?;
        Ok(Self {
            client,
            probe_timeout,
            fetch_timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let result = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => ProbeOutcome::Exists,
            Ok(response) => ProbeOutcome::NotFound(response.status().as_u16()),
            Err(e) => ProbeOutcome::TransientError(e.to_string()),
        }
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        referer: Option<&str>,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let mut request = self.client.get(url).timeout(self.fetch_timeout);
        if let Some(referer) = referer.filter(|r| !r.is_empty()) {
            request = request.header(REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        match stream_to_file(file, response, url, dest).await {
            Ok(bytes) => {
                debug!(url, path = %dest.display(), bytes, "page stored");
                Ok(bytes)
            }
            Err(e) => {
                // A leftover file would be taken for a complete page on the next run.
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    dest: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| FetchError::io(dest, e))?;
    Ok(bytes_written)
}
