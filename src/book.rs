use std::path::{Path, PathBuf};

/// Where a book lives, as worked out from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLocation {
    pub base_url: String,
    /// Prefix to which `/{page}.jpg` is appended.
    pub image_url_template: String,
    pub book_id: String,
    pub referer: String,
}

/// Inclusive page range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn page_count(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// Resolved, read-only description of a book's fetchable structure.
///
/// Shared by the downloader and the compositor; neither keeps it as state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDescriptor {
    location: BookLocation,
    range: PageRange,
}

impl BookDescriptor {
    pub fn new(location: BookLocation, range: PageRange) -> Self {
        Self { location, range }
    }

    pub fn base_url(&self) -> &str {
        &self.location.base_url
    }

    pub fn image_url_template(&self) -> &str {
        &self.location.image_url_template
    }

    pub fn book_id(&self) -> &str {
        &self.location.book_id
    }

    pub fn referer(&self) -> &str {
        &self.location.referer
    }

    pub fn range(&self) -> PageRange {
        self.range
    }

    pub fn start_page(&self) -> u32 {
        self.range.start()
    }

    pub fn end_page(&self) -> u32 {
        self.range.end()
    }

    pub fn page_url(&self, page: u32) -> String {
        page_url(&self.location.image_url_template, page)
    }

    pub fn image_dir(&self, image_root: &Path) -> PathBuf {
        image_root.join(&self.location.book_id)
    }

    pub fn page_path(&self, image_root: &Path, page: u32) -> PathBuf {
        self.image_dir(image_root).join(page_file_name(page))
    }

    pub fn output_file_name(&self) -> String {
        format!("{}.pdf", self.location.book_id)
    }
}

pub fn page_url(template: &str, page: u32) -> String {
    format!("{}/{}", template, page_file_name(page))
}

fn page_file_name(page: u32) -> String {
    format!("{page}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> BookDescriptor {
        BookDescriptor::new(
            BookLocation {
                base_url: "https://host/ebooks/x".to_string(),
                image_url_template: "https://host/ebooks/x/files/mobile".to_string(),
                book_id: "x".to_string(),
                referer: "https://host/ebooks/x/".to_string(),
            },
            PageRange::new(1, 12).unwrap(),
        )
    }

    #[test]
    fn test_page_range_rejects_inverted_bounds() {
        assert!(PageRange::new(5, 4).is_none());
        let single = PageRange::new(7, 7).unwrap();
        assert_eq!(single.page_count(), 1);
        assert_eq!(single.pages().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_page_url_and_paths() {
        let book = descriptor();
        assert_eq!(book.page_url(3), "https://host/ebooks/x/files/mobile/3.jpg");
        assert_eq!(
            book.page_path(Path::new("images"), 12),
            PathBuf::from("images/x/12.jpg")
        );
        assert_eq!(book.output_file_name(), "x.pdf");
        assert_eq!(book.range().page_count(), 12);
    }
}
