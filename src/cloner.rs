use std::path::PathBuf;
use std::sync::Arc;

use colored::*;
use tracing::{info, warn};

use crate::book::BookDescriptor;
use crate::compositor::{CompositionReport, Compositor};
use crate::config::Config;
use crate::downloader::{Downloader, FetchReport};
use crate::error::CloneError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::resolver::Resolver;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct CloneSummary {
    pub book: BookDescriptor,
    pub image_dir: PathBuf,
    pub fetch: FetchReport,
    pub composition: CompositionReport,
}

/// Runs resolve → download → compose for one book URL.
pub struct BookCloner {
    config: Config,
    transport: Arc<dyn HttpTransport>,
}

impl BookCloner {
    pub fn new(config: Config) -> Result<Self, CloneError> {
        let transport = ReqwestTransport::new(config.probe_timeout, config.fetch_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: Config,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, CloneError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, book_url: &str) -> Result<CloneSummary, CloneError> {
        info!("Starting book cloning process...");

        let resolver = Resolver::new(Arc::clone(&self.transport), self.config.max_pages);
        let book = resolver.resolve(book_url).await?;
        log_book(&book);

        info!("{}", "STEP 1: Downloading Images".bold());
        let downloader = Downloader::new(
            Arc::clone(&self.transport),
            &self.config.image_root,
            self.config.concurrency,
        )?;
        let fetch = downloader.download_all(&book).await?;
        if self.config.strict && !fetch.is_complete() {
            return Err(CloneError::IncompleteFetch {
                failed: fetch.failed(),
                scheduled: fetch.scheduled,
            });
        }

        info!("{}", "STEP 2: Creating PDF".bold());
        let compositor = Compositor::new(&self.config.image_root, &self.config.output_dir);
        let composition = compositor.create_pdf(&book).await?;
        if composition.skipped_count() > 0 {
            warn!(
                "{} of {} pages were not added to the PDF",
                composition.skipped_count(),
                book.range().page_count()
            );
        }

        Ok(CloneSummary {
            image_dir: book.image_dir(&self.config.image_root),
            book,
            fetch,
            composition,
        })
    }
}

fn log_book(book: &BookDescriptor) {
    info!("Book Information:");
    info!("  Book Name: {}", book.book_id().green());
    info!("  Base URL: {}", book.base_url());
    info!("  Image URL: {}", book.image_url_template());
    info!("  Pages: {} to {}", book.start_page(), book.end_page());
}
