//! Bounded concurrent download of the pages missing from the local cache.
//!
//! A page file that exists is considered complete, so re-running after a
//! partial download only fetches what is still missing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use colored::*;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::book::BookDescriptor;
use crate::config::check_concurrency;
use crate::error::{CloneError, FetchError};
use crate::http::HttpTransport;

const PROGRESS_INTERVAL: usize = 10;

/// Outcome of a download batch.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Pages that were already on disk.
    pub already_present: usize,
    /// Pages that had to be fetched.
    pub scheduled: usize,
    pub succeeded: usize,
    pub failures: Vec<(u32, FetchError)>,
}

impl FetchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Downloader {
    transport: Arc<dyn HttpTransport>,
    image_root: PathBuf,
    semaphore: Arc<Semaphore>,
}

impl Downloader {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        image_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Result<Self, CloneError> {
        check_concurrency(concurrency)?;
        Ok(Self {
            transport,
            image_root: image_root.into(),
            semaphore: Arc::new(Semaphore::new(concurrency)),
        })
    }

    /// Page numbers in the book's range with no file on disk.
    pub async fn missing_pages(&self, book: &BookDescriptor) -> Vec<u32> {
        let mut missing = Vec::new();
        for page in book.range().pages() {
            let path = book.page_path(&self.image_root, page);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                missing.push(page);
            }
        }
        missing
    }

    /// Fetches every missing page. Individual failures are collected in the
    /// report; only failing to create the image directory is an error.
    pub async fn download_all(&self, book: &BookDescriptor) -> Result<FetchReport, CloneError> {
        let image_dir = book.image_dir(&self.image_root);
        fs::create_dir_all(&image_dir)
            .await
            .map_err(|source| CloneError::Storage {
                path: image_dir.clone(),
                source,
            })?;

        let missing = self.missing_pages(book).await;
        let total_pages = book.range().page_count();
        let mut report = FetchReport {
            already_present: total_pages - missing.len(),
            scheduled: missing.len(),
            ..Default::default()
        };

        if missing.is_empty() {
            info!("All images already exist. Skipping download.");
            return Ok(report);
        }

        info!(
            "Found {} missing images in {}. Downloading...",
            missing.len(),
            image_dir.display().to_string().blue()
        );
        info!(
            "Total pages: {} (from {} to {})",
            total_pages,
            book.start_page(),
            book.end_page()
        );

        let completed = Arc::new(AtomicUsize::new(0));
        let to_download = missing.len();
        let mut handles = Vec::with_capacity(to_download);

        for page in missing {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| CloneError::SemaphoreClosed)?;

            let transport = Arc::clone(&self.transport);
            let completed = Arc::clone(&completed);
            let url = book.page_url(page);
            let path = book.page_path(&self.image_root, page);
            let referer = book.referer().to_string();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = fetch_page(transport.as_ref(), &url, &referer, &path).await;

                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if current % PROGRESS_INTERVAL == 0 || current == to_download {
                    info!(
                        "Progress: {}/{} images processed ({:.1}%)",
                        current,
                        to_download,
                        current as f64 / to_download as f64 * 100.0
                    );
                }
                result
            });
            handles.push((page, handle));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        for (page, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                Err(FetchError::TaskFailed {
                    url: book.page_url(page),
                    reason: e.to_string(),
                })
            });
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!("Error: failed to download page {}: {}", page, e);
                    report.failures.push((page, e));
                }
            }
        }
        report.failures.sort_by_key(|(page, _)| *page);

        if report.is_complete() {
            info!(
                "Download complete! All {} images downloaded successfully.",
                report.succeeded
            );
        } else {
            warn!(
                "{}",
                format!("Warning: {} images failed to download", report.failed()).yellow()
            );
        }

        Ok(report)
    }
}

async fn fetch_page(
    transport: &dyn HttpTransport,
    url: &str,
    referer: &str,
    path: &Path,
) -> Result<(), FetchError> {
    let bytes = transport.fetch_to_file(url, Some(referer), path).await?;
    debug!(url, bytes, "page downloaded");
    Ok(())
}
