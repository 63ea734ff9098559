use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tokio::fs;
use tracing::{debug, info};

use crate::error::CloneError;
use crate::layout::LayoutResult;

const POINTS_PER_MM: f64 = 72.0 / 25.4;
const IMAGE_NAME: &str = "Im1";

/// Colour model of an embedded JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    fn pdf_name(self) -> &'static [u8] {
        match self {
            ColorSpace::Gray => b"DeviceGray",
            ColorSpace::Rgb => b"DeviceRGB",
            ColorSpace::Cmyk => b"DeviceCMYK",
        }
    }
}

/// JPEG data ready to be embedded without re-encoding.
#[derive(Debug, Clone)]
pub struct JpegImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

/// Builds a PDF out of fixed-size pages, each showing one image.
pub struct PdfWriter {
    document: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    page_width_mm: f64,
    page_height_mm: f64,
}

impl PdfWriter {
    pub fn new(page_width_mm: f64, page_height_mm: f64) -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            page_ids: Vec::new(),
            page_width_mm,
            page_height_mm,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Appends a page and draws `image` at `layout` (millimetres, top-left origin).
    pub fn add_image_page(&mut self, image: JpegImage, layout: LayoutResult) -> lopdf::Result<()> {
        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(i64::from(image.width)));
        image_dict.set("Height", Object::Integer(i64::from(image.height)));
        image_dict.set("ColorSpace", Object::Name(image.color_space.pdf_name().to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        if image.color_space == ColorSpace::Cmyk && has_adobe_marker(&image.data) {
            // Adobe writes CMYK JPEGs with inverted components.
            image_dict.set(
                "Decode",
                Object::Array([1, 0, 1, 0, 1, 0, 1, 0].into_iter().map(Object::Integer).collect()),
            );
        }
        let image_id = self
            .document
            .add_object(Stream::new(image_dict, image.data));

        // PDF user space has its origin at the bottom-left corner.
        let width = layout.width * POINTS_PER_MM;
        let height = layout.height * POINTS_PER_MM;
        let x = layout.x * POINTS_PER_MM;
        let y = (self.page_height_mm - layout.y - layout.height) * POINTS_PER_MM;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        real(height),
                        real(x),
                        real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode()?;
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let resources = Dictionary::from_iter([(
            "XObject",
            Object::Dictionary(Dictionary::from_iter([(
                IMAGE_NAME,
                Object::Reference(image_id),
            )])),
        )]);

        let page = Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            ("MediaBox", self.media_box()),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]);
        let page_id = self.document.add_object(page);
        self.page_ids.push(page_id);

        debug!(page = self.page_ids.len(), "image page added");
        Ok(())
    }

    /// Finalises the page tree and writes the document to `output_path`.
    pub async fn save(mut self, output_path: &Path) -> Result<(), CloneError> {
        let page_count = self.page_ids.len();
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            (
                "Kids",
                Object::Array(self.page_ids.iter().copied().map(Object::Reference).collect()),
            ),
            ("Count", Object::Integer(page_count as i64)),
        ]);
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));

        info!("Finalizing PDF with {} pages", page_count);

        let mut data = Vec::new();
        self.document
            .save_to(&mut data)
            .map_err(|e| CloneError::OutputWrite {
                path: output_path.to_path_buf(),
                reason: format!("failed to serialize PDF: {e}"),
            })?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CloneError::OutputWrite {
                    path: output_path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        fs::write(output_path, data)
            .await
            .map_err(|e| CloneError::OutputWrite {
                path: output_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn media_box(&self) -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            real(self.page_width_mm * POINTS_PER_MM),
            real(self.page_height_mm * POINTS_PER_MM),
        ])
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Whether the JPEG carries an Adobe APP14 segment before its scan data.
fn has_adobe_marker(data: &[u8]) -> bool {
    const SOS: u8 = 0xDA;
    const APP14: u8 = 0xEE;

    let mut offset = 2;
    while offset + 4 <= data.len() && data[offset] == 0xFF {
        let marker = data[offset + 1];
        if marker == SOS {
            break;
        }
        let length = usize::from(u16::from_be_bytes([data[offset + 2], data[offset + 3]]));
        let body_start = offset + 4;
        let body_end = (offset + 2 + length).min(data.len());
        if marker == APP14 && data.get(body_start..body_end).is_some_and(|b| b.starts_with(b"Adobe")) {
            return true;
        }
        if length < 2 {
            break;
        }
        offset += 2 + length;
    }
    false
}
