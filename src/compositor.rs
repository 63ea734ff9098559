//! Assembles locally stored pages into a single PDF.
//!
//! Pages are visited in ascending page order, so the document order never
//! depends on the order in which the downloads finished. Missing or
//! undecodable pages are skipped and reported.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use colored::*;
use image::{ExtendedColorType, ImageDecoder, ImageFormat, ImageReader};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::book::BookDescriptor;
use crate::error::{AssetError, CloneError};
use crate::layout::{calculate_page_layout, A4_HEIGHT_MM, A4_WIDTH_MM};
use crate::pdf_writer::{ColorSpace, JpegImage, PdfWriter};

const PROGRESS_INTERVAL: usize = 50;

#[derive(Debug, Default)]
pub struct CompositionReport {
    pub output_path: PathBuf,
    /// Page numbers written to the document, ascending.
    pub pages_written: Vec<u32>,
    pub skipped: Vec<(u32, AssetError)>,
}

impl CompositionReport {
    pub fn page_count(&self) -> usize {
        self.pages_written.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

pub struct Compositor {
    image_root: PathBuf,
    output_dir: PathBuf,
    canvas_width: f64,
    canvas_height: f64,
}

impl Compositor {
    /// A compositor producing A4 portrait pages.
    pub fn new(image_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_root: image_root.into(),
            output_dir: output_dir.into(),
            canvas_width: A4_WIDTH_MM,
            canvas_height: A4_HEIGHT_MM,
        }
    }

    pub fn output_path(&self, book: &BookDescriptor) -> PathBuf {
        self.output_dir.join(book.output_file_name())
    }

    pub async fn create_pdf(&self, book: &BookDescriptor) -> Result<CompositionReport, CloneError> {
        let output_path = self.output_path(book);
        let total = book.range().page_count();
        let mut writer = PdfWriter::new(self.canvas_width, self.canvas_height);
        let mut report = CompositionReport {
            output_path: output_path.clone(),
            ..Default::default()
        };

        for (index, page) in book.range().pages().enumerate() {
            let path = book.page_path(&self.image_root, page);

            match load_jpeg(&path).await {
                Ok(image) => {
                    let layout = calculate_page_layout(
                        f64::from(image.width),
                        f64::from(image.height),
                        self.canvas_width,
                        self.canvas_height,
                    );
                    writer
                        .add_image_page(image, layout)
                        .map_err(|e| CloneError::OutputWrite {
                            path: output_path.clone(),
                            reason: format!("failed to encode page {page}: {e}"),
                        })?;
                    report.pages_written.push(page);
                }
                Err(e) => {
                    warn!("Image {} skipped: {}", page, e);
                    report.skipped.push((page, e));
                }
            }

            if (index + 1) % PROGRESS_INTERVAL == 0 {
                info!("Added {}/{} pages to PDF...", index + 1, total);
            }
        }

        if report.pages_written.is_empty() {
            warn!("No usable images found, writing an empty document");
        }

        writer.save(&output_path).await?;

        info!(
            "PDF saved to: {} ({} pages, {} skipped)",
            output_path.display().to_string().blue(),
            report.page_count(),
            report.skipped_count()
        );
        Ok(report)
    }
}

/// Reads and fully decodes the JPEG at `path`, keeping the original bytes for
/// embedding.
async fn load_jpeg(path: &Path) -> Result<JpegImage, AssetError> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AssetError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(AssetError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    let owned_path = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspect_jpeg(data, owned_path))
        .await
        .map_err(|e| AssetError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
}

fn inspect_jpeg(data: Vec<u8>, path: PathBuf) -> Result<JpegImage, AssetError> {
    let decode_error = |reason: String| AssetError::Decode {
        path: path.clone(),
        reason,
    };

    let reader = ImageReader::new(Cursor::new(data.as_slice()))
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?;
    if reader.format() != Some(ImageFormat::Jpeg) {
        return Err(AssetError::UnsupportedFormat { path: path.clone() });
    }

    let decoder = reader
        .into_decoder()
        .map_err(|e| decode_error(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(decode_error(format!("empty image {width}x{height}")));
    }
    let color_space = match decoder.original_color_type() {
        ExtendedColorType::L8 | ExtendedColorType::L16 => ColorSpace::Gray,
        ExtendedColorType::Cmyk8 => ColorSpace::Cmyk,
        _ => ColorSpace::Rgb,
    };

    let mut pixels = vec![0u8; decoder.total_bytes() as usize];
    decoder
        .read_image(&mut pixels)
        .map_err(|e| decode_error(e.to_string()))?;

    debug!(path = %path.display(), width, height, ?color_space, "image decoded");
    Ok(JpegImage {
        data,
        width,
        height,
        color_space,
    })
}
