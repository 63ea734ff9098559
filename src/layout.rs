/// A4 portrait, in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;

/// Placement of an image on the canvas, top-left origin, canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutResult {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scales an `img_width` x `img_height` image to fit the canvas, keeping its
/// aspect ratio, and centres it.
pub fn calculate_page_layout(
    img_width: f64,
    img_height: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> LayoutResult {
    let ratio = (canvas_width / img_width).min(canvas_height / img_height);

    let width = img_width * ratio;
    let height = img_height * ratio;

    LayoutResult {
        x: (canvas_width - width) / 2.0,
        y: (canvas_height - height) / 2.0,
        width,
        height,
    }
}
