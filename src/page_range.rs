//! Discovery of the contiguous page range `[1, N]` behind an image template.
//!
//! Only existence checks are used: an exponential search finds an upper bound
//! that does not exist, then a binary search finds the last page that does.
//! Both phases together need `O(log N)` probes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::book::{page_url, PageRange};
use crate::error::CloneError;
use crate::http::{HttpTransport, ProbeOutcome};

pub struct PageRangeDetector {
    transport: Arc<dyn HttpTransport>,
    max_pages: u32,
}

impl PageRangeDetector {
    pub fn new(transport: Arc<dyn HttpTransport>, max_pages: u32) -> Self {
        Self {
            transport,
            max_pages,
        }
    }

    pub async fn detect(&self, template: &str) -> Result<PageRange, CloneError> {
        info!("Auto-detecting page range...");

        let upper_bound = self.find_upper_bound(template).await?;
        debug!(template, upper_bound, "upper bound found");

        let mut low = 1;
        let mut high = upper_bound;
        let mut last_page = None;

        while low <= high {
            let mid = low + (high - low) / 2;
            if self.page_exists(template, mid).await {
                last_page = Some(mid);
                low = mid + 1;
            } else {
                high = mid - 1;
            }
        }

        let end = last_page.ok_or_else(|| CloneError::NoPagesFound {
            template: template.to_string(),
        })?;

        info!("Detected pages: {} to {}", 1, end);
        PageRange::new(1, end).ok_or_else(|| CloneError::NoPagesFound {
            template: template.to_string(),
        })
    }

    /// Doubles `n` from 1 while page `n` exists. Returns the first missing `n`.
    async fn find_upper_bound(&self, template: &str) -> Result<u32, CloneError> {
        let mut n: u32 = 1;

        if !self.page_exists(template, n).await {
            return Err(CloneError::NoPagesFound {
                template: template.to_string(),
            });
        }

        loop {
            n = n.saturating_mul(2);
            if n > self.max_pages {
                return Err(CloneError::RangeDetection {
                    template: template.to_string(),
                    ceiling: self.max_pages,
                });
            }
            if !self.page_exists(template, n).await {
                return Ok(n);
            }
        }
    }

    async fn page_exists(&self, template: &str, page: u32) -> bool {
        let url = page_url(template, page);
        match self.transport.probe(&url).await {
            ProbeOutcome::Exists => true,
            ProbeOutcome::NotFound(status) => {
                debug!(page, status, "page probe missed");
                false
            }
            ProbeOutcome::TransientError(reason) => {
                warn!(page, %reason, "page probe failed, treating as missing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;

    const TEMPLATE: &str = "https://host/ebooks/x/files/mobile";

    fn detector(transport: &Arc<FakeTransport>) -> PageRangeDetector {
        PageRangeDetector::new(transport.clone(), 10_000)
    }

    fn probed_pages(transport: &FakeTransport) -> Vec<u32> {
        transport
            .probed()
            .iter()
            .map(|url| {
                url.trim_start_matches(TEMPLATE)
                    .trim_start_matches('/')
                    .trim_end_matches(".jpg")
                    .parse()
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fifty_pages_exponential_then_binary_search() {
        let transport = Arc::new(FakeTransport::new().with_pages(TEMPLATE, 50));
        let range = detector(&transport).detect(TEMPLATE).await.unwrap();

        assert_eq!((range.start(), range.end()), (1, 50));

        let probes = probed_pages(&transport);
        assert_eq!(&probes[..7], &[1, 2, 4, 8, 16, 32, 64]);
        // Binary search over [1, 64].
        assert_eq!(&probes[7..], &[32, 48, 56, 52, 50, 51]);
    }

    #[tokio::test]
    async fn test_detected_end_is_exact_boundary() {
        for pages in 1..=130 {
            let transport = Arc::new(FakeTransport::new().with_pages(TEMPLATE, pages));
            let range = detector(&transport).detect(TEMPLATE).await.unwrap();
            assert_eq!(range.start(), 1);
            assert_eq!(range.end(), pages, "wrong end for {pages} pages");
        }
    }

    #[tokio::test]
    async fn test_no_pages_found() {
        let transport = Arc::new(FakeTransport::new());
        let result = detector(&transport).detect(TEMPLATE).await;
        assert!(matches!(result, Err(CloneError::NoPagesFound { .. })));
        assert_eq!(transport.probed().len(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_exceeded() {
        let transport = Arc::new(FakeTransport::new().with_pages(TEMPLATE, 300));
        let result = PageRangeDetector::new(transport.clone(), 200)
            .detect(TEMPLATE)
            .await;
        assert!(matches!(
            result,
            Err(CloneError::RangeDetection { ceiling: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_count_is_logarithmic() {
        let transport = Arc::new(FakeTransport::new().with_pages(TEMPLATE, 1000));
        let range = detector(&transport).detect(TEMPLATE).await.unwrap();
        assert_eq!(range.end(), 1000);
        assert!(transport.probed().len() <= 2 * 12, "too many probes");
    }
}
