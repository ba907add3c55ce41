//! Document-generation capability consumed by the export pipeline.
//!
//! Coordinates are in points with the origin at the top-left corner of the
//! current page; y grows downwards.

use thiserror::Error;

/// Failures reported by a document engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The image payload could not be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The document could not be serialized.
    #[error("failed to serialize document: {0}")]
    Serialize(String),
}

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const GREY: Self = Self::rgb(0.45, 0.45, 0.45);
    pub const ACCENT: Self = Self::rgb(0.11, 0.31, 0.55);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// How a run of text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub color: Color,
}

impl TextStyle {
    pub const fn new(size: f32) -> Self {
        Self {
            size,
            bold: false,
            color: Color::BLACK,
        }
    }

    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    #[must_use]
    pub const fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait.
    pub const A4: Self = Self {
        width: 595.0,
        height: 842.0,
    };
}

/// Handle to an image registered with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(pub usize);

/// A paginated document under construction.
pub trait DocumentEngine {
    /// Size of every page.
    fn page_size(&self) -> PageSize;

    /// Number of pages so far. A fresh engine has one page.
    fn page_count(&self) -> usize;

    /// Append a page and make it current.
    fn add_page(&mut self);

    /// Make an existing page current (zero-based).
    fn set_page(&mut self, index: usize);

    /// Place a single line of text with its baseline at `y`.
    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle);

    /// Decode a base64 image payload and register it for drawing.
    fn load_image(&mut self, payload_base64: &str) -> Result<ImageRef, EngineError>;

    /// Draw a registered image into the given box.
    fn draw_image(&mut self, image: ImageRef, x: f32, y: f32, width: f32, height: f32);

    /// Stroke a rectangle outline.
    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color);

    /// Serialize the document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, EngineError>;
}

/// Per-document engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Images are resampled so their longest side is at most this many pixels.
    pub max_image_px: u32,
}

/// Creates a fresh engine for each export.
pub trait EngineFactory: Send + Sync {
    fn create(&self, options: EngineOptions) -> Box<dyn DocumentEngine>;
}
