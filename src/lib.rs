//! # bookclone
//!
//! A CLI utility to clone paginated online books (one JPEG per page served at
//! predictable URLs) into a local image set and a single PDF.
//!
//! ## Pipeline
//!
//! - URL structure resolution: base URL, book id and image directory
//! - Page range detection with exponential probing plus binary search
//! - Bounded concurrent download of missing pages (safe to re-run)
//! - PDF assembly with centred, aspect-preserving A4 pages
//!
//! ## Usage
//!
//! ```bash
//! bookclone "https://www.example.org/ebooks/2019/06/some-book/#p=1"
//! ```

mod book;
mod cloner;
mod compositor;
mod config;
mod downloader;
mod error;
mod http;
mod layout;
mod page_range;
mod pdf_writer;
mod resolver;

#[cfg(test)]
mod test_support;

pub use book::{BookDescriptor, BookLocation, PageRange};
pub use cloner::{BookCloner, CloneSummary};
pub use compositor::{CompositionReport, Compositor};
pub use config::{Config, BROWSER_USER_AGENT};
pub use downloader::{Downloader, FetchReport};
pub use error::{AssetError, CloneError, FetchError};
pub use http::{HttpTransport, ProbeOutcome, ReqwestTransport};
pub use layout::{calculate_page_layout, LayoutResult, A4_HEIGHT_MM, A4_WIDTH_MM};
pub use page_range::PageRangeDetector;
pub use pdf_writer::{ColorSpace, JpegImage, PdfWriter};
pub use resolver::{normalize_book_url, Resolver, IMAGE_PATH_SUFFIXES};
