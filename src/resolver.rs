//! Turns an arbitrary book URL into a [`BookDescriptor`].
//!
//! The URL is normalised to `scheme://host/path`, the book id is taken from the
//! last path segment and the image directory is found by probing a fixed list
//! of well-known suffixes for page 1. A URL that already points into an image
//! directory is only reinterpreted when the book itself does not answer.

use std::sync::Arc;

use colored::*;
use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};
use url::Url;

use crate::book::{page_url, BookDescriptor, BookLocation};
use crate::error::CloneError;
use crate::http::HttpTransport;
use crate::page_range::PageRangeDetector;

/// Image directory suffixes, most likely first.
pub const IMAGE_PATH_SUFFIXES: &[&str] = &[
    "/files/mobile",
    "/files",
    "/pages",
    "/images",
    "/mobile",
    "/page",
];

/// Re-checked in order when no suffix answered; `{base}` is the last resort.
const FALLBACK_SUFFIXES: &[&str] = &["/files/mobile", "/files"];

const DEFAULT_BOOK_ID: &str = "book";

pub struct Resolver {
    transport: Arc<dyn HttpTransport>,
    detector: PageRangeDetector,
}

impl Resolver {
    pub fn new(transport: Arc<dyn HttpTransport>, max_pages: u32) -> Self {
        Self {
            detector: PageRangeDetector::new(transport.clone(), max_pages),
            transport,
        }
    }

    /// Resolves the structure of `book_url` and detects its page range.
    pub async fn resolve(&self, book_url: &str) -> Result<BookDescriptor, CloneError> {
        info!("Parsing URL: {}", book_url.green());

        let location = self.resolve_location(book_url).await?;
        let range = self.detector.detect(&location.image_url_template).await?;

        Ok(BookDescriptor::new(location, range))
    }

    /// Derives base URL, book id, referer and image template without
    /// detecting pages.
    pub async fn resolve_location(&self, book_url: &str) -> Result<BookLocation, CloneError> {
        let (base_url, book_id) = normalize_book_url(book_url)?;
        debug!(%base_url, %book_id, "normalized book URL");

        if let Some(template) = self.detect_image_template(&base_url).await {
            return Ok(book_location(base_url, book_id, template));
        }

        if let Some(parent) = parent_of_image_directory(&base_url) {
            let (parent_url, parent_id) = normalize_book_url(&parent)?;

            if self.first_page_exists(&base_url).await {
                info!("URL points at the image directory, book is {}", parent_url.green());
                return Ok(book_location(parent_url, parent_id, base_url));
            }
            if let Some(template) = self.detect_image_template(&parent_url).await {
                return Ok(book_location(parent_url, parent_id, template));
            }
        }

        let template = self.fallback_image_template(&base_url).await;
        Ok(book_location(base_url, book_id, template))
    }

    async fn detect_image_template(&self, base_url: &str) -> Option<String> {
        for suffix in IMAGE_PATH_SUFFIXES {
            let candidate = format!("{base_url}{suffix}");
            if self.first_page_exists(&candidate).await {
                info!("Detected image pattern: {}", suffix.blue());
                return Some(candidate);
            }
        }
        None
    }

    async fn fallback_image_template(&self, base_url: &str) -> String {
        for suffix in FALLBACK_SUFFIXES {
            let candidate = format!("{base_url}{suffix}");
            if self.first_page_exists(&candidate).await {
                return candidate;
            }
        }

        warn!(
            "No image pattern detected, falling back to {}",
            base_url.yellow()
        );
        base_url.to_string()
    }

    async fn first_page_exists(&self, template: &str) -> bool {
        self.transport.probe(&page_url(template, 1)).await.exists()
    }
}

fn book_location(base_url: String, book_id: String, image_url_template: String) -> BookLocation {
    BookLocation {
        referer: format!("{base_url}/"),
        base_url,
        image_url_template,
        book_id,
    }
}

/// Returns `(base_url, book_id)` for `book_url`.
///
/// The fragment and query are dropped and the trailing slash trimmed. The book
/// id is the last path segment, percent-decoded and stripped of path
/// separators so it can name a directory and a file.
pub fn normalize_book_url(book_url: &str) -> Result<(String, String), CloneError> {
    let trimmed = book_url.trim();
    let parsed = Url::parse(trimmed).map_err(|e| CloneError::invalid_url(trimmed, e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CloneError::invalid_url(
            trimmed,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| CloneError::invalid_url(trimmed, "missing host"))?;
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let book_id = segments
        .last()
        .and_then(|segment| decode_book_id(segment))
        .unwrap_or_else(|| DEFAULT_BOOK_ID.to_string());

    let path = if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    };
    let base_url = format!("{}://{}{}", parsed.scheme(), authority, path);

    Ok((base_url, book_id))
}

fn decode_book_id(segment: &str) -> Option<String> {
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let id: String = decoded.chars().filter(|&c| !matches!(c, '/' | '\\')).collect();
    match id.trim() {
        "" | "." | ".." => None,
        _ => Some(id),
    }
}

/// `base_url` with a trailing known image directory removed, as long as some
/// path remains.
fn parent_of_image_directory(base_url: &str) -> Option<String> {
    let authority_start = base_url.find("://")? + 3;
    let path_start = authority_start + base_url[authority_start..].find('/')?;

    IMAGE_PATH_SUFFIXES.iter().find_map(|suffix| {
        let parent = base_url.strip_suffix(suffix)?;
        (parent.len() > path_start).then(|| parent.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;

    #[test]
    fn test_normalize_keeps_image_directory_names() {
        let (base, id) = normalize_book_url("https://host/shelf/page").unwrap();
        assert_eq!(base, "https://host/shelf/page");
        assert_eq!(id, "page");

        let (base, id) = normalize_book_url("https://host/ebooks/2019/06/images/#p=1").unwrap();
        assert_eq!(base, "https://host/ebooks/2019/06/images");
        assert_eq!(id, "images");
    }

    #[test]
    fn test_normalize_decodes_book_id() {
        let (base, id) = normalize_book_url("https://host/ebooks/%E1%9E%80%E1%9E%81").unwrap();
        assert_eq!(base, "https://host/ebooks/%E1%9E%80%E1%9E%81");
        assert_eq!(id, "\u{1780}\u{1781}");

        let (_, id) = normalize_book_url("https://host/ebooks/a%2Fb%5Cc").unwrap();
        assert_eq!(id, "abc");
    }

    #[test]
    fn test_parent_of_image_directory() {
        assert_eq!(
            parent_of_image_directory("https://host/ebooks/x/files/mobile").as_deref(),
            Some("https://host/ebooks/x")
        );
        assert_eq!(
            parent_of_image_directory("https://host/library/mobile").as_deref(),
            Some("https://host/library")
        );
        assert_eq!(parent_of_image_directory("https://host/pages"), None);
        assert_eq!(parent_of_image_directory("https://host/ebooks/mypage"), None);
    }

    #[test]
    fn test_normalize_plain_book_url() {
        let (base, id) =
            normalize_book_url("https://www.example.org/ebooks/2019/06/sk-23-06-19/?q=1#p=5")
                .unwrap();
        assert_eq!(base, "https://www.example.org/ebooks/2019/06/sk-23-06-19");
        assert_eq!(id, "sk-23-06-19");
    }

    #[test]
    fn test_normalize_empty_path_defaults_book_id() {
        let (base, id) = normalize_book_url("http://localhost:8080/").unwrap();
        assert_eq!(base, "http://localhost:8080");
        assert_eq!(id, "book");
    }

    #[test]
    fn test_normalize_keeps_lone_suffix_segment() {
        let (base, id) = normalize_book_url("https://host/pages").unwrap();
        assert_eq!(base, "https://host/pages");
        assert_eq!(id, "pages");
    }

    #[test]
    fn test_normalize_rejects_malformed_urls() {
        for input in ["not a url", "/ebooks/x", "ftp://host/ebooks/x", "mailto:a@b.c"] {
            let result = normalize_book_url(input);
            assert!(
                matches!(result, Err(CloneError::InvalidUrl { .. })),
                "expected InvalidUrl for {input}"
            );
        }
    }

    #[tokio::test]
    async fn test_first_responding_suffix_wins() {
        let transport = Arc::new(
            FakeTransport::new()
                .with_pages("https://host/ebooks/x/pages", 3)
                .with_pages("https://host/ebooks/x/images", 3),
        );
        let resolver = Resolver::new(transport.clone(), 10_000);

        let location = resolver
            .resolve_location("https://host/ebooks/x/#p=1")
            .await
            .unwrap();

        assert_eq!(location.image_url_template, "https://host/ebooks/x/pages");
        assert_eq!(location.referer, "https://host/ebooks/x/");
        assert_eq!(location.book_id, "x");
        assert_eq!(
            transport.probed(),
            vec![
                "https://host/ebooks/x/files/mobile/1.jpg",
                "https://host/ebooks/x/files/1.jpg",
                "https://host/ebooks/x/pages/1.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_base_when_nothing_responds() {
        let transport = Arc::new(FakeTransport::new());
        let resolver = Resolver::new(transport.clone(), 10_000);

        let location = resolver
            .resolve_location("https://host/ebooks/y")
            .await
            .unwrap();

        assert_eq!(location.image_url_template, "https://host/ebooks/y");
        // Every suffix plus the verified fallback chain.
        assert_eq!(transport.probed().len(), IMAGE_PATH_SUFFIXES.len() + 2);
    }

    #[tokio::test]
    async fn test_book_named_like_image_directory_resolves() {
        let transport = Arc::new(
            FakeTransport::new().with_pages("https://host/shelf/page/files/mobile", 4),
        );
        let resolver = Resolver::new(transport.clone(), 10_000);

        let book = resolver.resolve("https://host/shelf/page").await.unwrap();

        assert_eq!(book.base_url(), "https://host/shelf/page");
        assert_eq!(book.image_url_template(), "https://host/shelf/page/files/mobile");
        assert_eq!(book.book_id(), "page");
        assert_eq!(book.end_page(), 4);
        assert_eq!(
            transport.probed()[0],
            "https://host/shelf/page/files/mobile/1.jpg"
        );
    }

    #[tokio::test]
    async fn test_image_directory_url_is_used_as_template() {
        let transport = Arc::new(
            FakeTransport::new().with_pages("https://host/ebooks/x/files/mobile", 3),
        );
        let resolver = Resolver::new(transport.clone(), 10_000);

        let location = resolver
            .resolve_location("https://host/ebooks/x/files/mobile/#p=1")
            .await
            .unwrap();

        assert_eq!(location.base_url, "https://host/ebooks/x");
        assert_eq!(location.image_url_template, "https://host/ebooks/x/files/mobile");
        assert_eq!(location.book_id, "x");
        assert_eq!(location.referer, "https://host/ebooks/x/");
        // Every suffix below the given URL, then the URL itself.
        assert_eq!(transport.probed().len(), IMAGE_PATH_SUFFIXES.len() + 1);
    }

    #[tokio::test]
    async fn test_image_directory_url_falls_back_to_parent_book() {
        let transport = Arc::new(
            FakeTransport::new().with_pages("https://host/ebooks/x/files/mobile", 3),
        );
        let resolver = Resolver::new(transport, 10_000);

        let location = resolver
            .resolve_location("https://host/ebooks/x/images/")
            .await
            .unwrap();

        assert_eq!(location.base_url, "https://host/ebooks/x");
        assert_eq!(location.image_url_template, "https://host/ebooks/x/files/mobile");
        assert_eq!(location.book_id, "x");
    }

    #[tokio::test]
    async fn test_resolve_builds_descriptor() {
        let transport = Arc::new(
            FakeTransport::new().with_pages("https://host/ebooks/x/files/mobile", 50),
        );
        let resolver = Resolver::new(transport, 10_000);

        let book = resolver
            .resolve("https://host/ebooks/x/files/mobile/#p=1")
            .await
            .unwrap();

        assert_eq!(book.base_url(), "https://host/ebooks/x");
        assert_eq!(book.image_url_template(), "https://host/ebooks/x/files/mobile");
        assert_eq!(book.book_id(), "x");
        assert_eq!((book.start_page(), book.end_page()), (1, 50));
    }

    #[tokio::test]
    async fn test_resolve_without_pages_fails() {
        let transport = Arc::new(FakeTransport::new());
        let resolver = Resolver::new(transport, 10_000);
        let result = resolver.resolve("https://host/ebooks/z").await;
        assert!(matches!(result, Err(CloneError::NoPagesFound { .. })));
    }
}
