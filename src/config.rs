use std::path::PathBuf;
use std::time::Duration;

use crate::error::CloneError;

/// Browser User-Agent sent with every probe and fetch.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_MAX_PAGES: u32 = 10_000;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 100;

/// Settings for one cloning run. Built once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the image cache; pages land in `{image_root}/{book_id}/{n}.jpg`.
    pub image_root: PathBuf,
    /// Directory receiving `{book_id}.pdf`.
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    /// Ceiling for the exponential page search.
    pub max_pages: u32,
    /// Treat any failed page fetch as fatal.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from("images"),
            output_dir: PathBuf::from("."),
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
            strict: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), CloneError> {
        check_concurrency(self.concurrency)
    }
}

pub(crate) fn check_concurrency(value: usize) -> Result<(), CloneError> {
    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&value) {
        return Err(CloneError::InvalidConcurrency { value });
    }
    Ok(())
}
