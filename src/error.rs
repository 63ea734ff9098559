//! Error types for the cloning pipeline.
//!
//! `CloneError` aborts a run. `FetchError` and `AssetError` describe a single
//! page and are collected into reports instead of being propagated.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors: any of these stops the whole run.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("page range detection failed for {template}: more than {ceiling} pages")]
    RangeDetection { template: String, ceiling: u32 },

    #[error("no pages found at {template}")]
    NoPagesFound { template: String },

    #[error("failed to create image directory {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} of {scheduled} pages failed to download")]
    IncompleteFetch { failed: usize, scheduled: usize },

    #[error("failed to write PDF to {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    #[error("invalid concurrency value {value}: must be between 1 and 100")]
    InvalidConcurrency { value: usize },

    #[error("download semaphore closed unexpectedly")]
    SemaphoreClosed,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl CloneError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to fetch one page. Never aborts the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timeout fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download task for {url} did not finish: {reason}")]
    TaskFailed { url: String, reason: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reason a locally stored page could not be placed into the document.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("image not found at {path}")]
    Missing { path: PathBuf },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("{path} is not a JPEG image")]
    UnsupportedFormat { path: PathBuf },
}
