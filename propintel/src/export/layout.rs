//! Vertical flow layout with pagination over a [`DocumentEngine`].
//!
//! Content is emitted as blocks. A block that does not fit in the space
//! left on the current page starts a new page first; a block taller than a
//! whole page is split between elements. Footers are stamped in a final
//! pass once the page count is known.

use super::engine::{Color, DocumentEngine, ImageRef, TextStyle};
use super::text::{to_ascii, wrap};

/// Page margin on every side, in points.
pub const MARGIN: f32 = 40.0;
/// Space reserved at the bottom of each page for the footer.
pub const FOOTER_BAND: f32 = 30.0;

const LINE_SPACING: f32 = 1.4;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.52;
const FIGURE_GAP: f32 = 12.0;

/// Characters of `style` that fit in `width` points.
fn chars_per_line(width: f32, style: TextStyle) -> usize {
    let per_char = style.size * GLYPH_WIDTH;
    if per_char <= 0.0 || width <= per_char {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = (width / per_char).floor() as usize;
    n
}

fn line_height(style: TextStyle) -> f32 {
    style.size * LINE_SPACING
}

/// Estimated rendered width of `text`.
#[allow(clippy::cast_precision_loss)]
fn text_width(text: &str, style: TextStyle) -> f32 {
    text.chars().count() as f32 * style.size * GLYPH_WIDTH
}

/// One line of text inside a figure caption.
#[derive(Debug, Clone)]
pub struct CaptionLine {
    pub text: String,
    pub style: TextStyle,
}

/// A unit of vertical content.
#[derive(Debug, Clone)]
pub enum Element {
    /// A single, already wrapped, line.
    Line {
        text: String,
        style: TextStyle,
        indent: f32,
    },
    /// Vertical whitespace.
    Gap(f32),
    /// An image (or a placeholder when `image` is `None`) with a caption
    /// placed to its right.
    Figure {
        image: Option<ImageRef>,
        width: f32,
        height: f32,
        caption: Vec<CaptionLine>,
    },
}

impl Element {
    fn height(&self) -> f32 {
        match self {
            Self::Line { style, .. } => line_height(*style),
            Self::Gap(h) => *h,
            Self::Figure {
                height, caption, ..
            } => {
                let caption_height: f32 = caption.iter().map(|c| line_height(c.style)).sum();
                height.max(caption_height) + FIGURE_GAP
            }
        }
    }
}

/// Elements that should stay on one page when possible.
#[derive(Debug, Clone, Default)]
pub struct Block {
    elements: Vec<Element>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `text` wrapped to `width` points, folded to ASCII.
    #[must_use]
    pub fn paragraph(mut self, text: &str, style: TextStyle, indent: f32, width: f32) -> Self {
        let ascii = to_ascii(text);
        for line in wrap(&ascii, chars_per_line(width - indent, style)) {
            self.elements.push(Element::Line {
                text: line,
                style,
                indent,
            });
        }
        self
    }

    #[must_use]
    pub fn gap(mut self, height: f32) -> Self {
        self.elements.push(Element::Gap(height));
        self
    }

    /// Add a figure whose caption wraps into the space right of the image.
    #[must_use]
    pub fn figure(
        mut self,
        image: Option<ImageRef>,
        size: (f32, f32),
        caption: &[(String, TextStyle)],
        content_width: f32,
    ) -> Self {
        let (width, height) = size;
        let caption_width = content_width - width - FIGURE_GAP;
        let caption = caption
            .iter()
            .flat_map(|(text, style)| {
                wrap(&to_ascii(text), chars_per_line(caption_width, *style))
                    .into_iter()
                    .map(|line| CaptionLine {
                        text: line,
                        style: *style,
                    })
            })
            .collect();
        self.elements.push(Element::Figure {
            image,
            width,
            height,
            caption,
        });
        self
    }

    pub fn height(&self) -> f32 {
        self.elements.iter().map(Element::height).sum()
    }
}

/// Flows blocks down the pages of an engine.
pub struct Layout<'a> {
    engine: &'a mut dyn DocumentEngine,
    y: f32,
}

impl<'a> Layout<'a> {
    pub fn new(engine: &'a mut dyn DocumentEngine) -> Self {
        Self { engine, y: MARGIN }
    }

    /// Usable width between the side margins.
    pub fn content_width(&self) -> f32 {
        self.engine.page_size().width - 2.0 * MARGIN
    }

    fn bottom(&self) -> f32 {
        self.engine.page_size().height - MARGIN - FOOTER_BAND
    }

    /// Vertical space left on the current page.
    pub fn remaining(&self) -> f32 {
        self.bottom() - self.y
    }

    fn at_top(&self) -> bool {
        self.y <= MARGIN
    }

    fn new_page(&mut self) {
        self.engine.add_page();
        self.y = MARGIN;
    }

    /// Emit `block`, starting a new page first if it does not fit.
    pub fn emit(&mut self, block: &Block) {
        if block.height() > self.remaining() && !self.at_top() {
            self.new_page();
        }
        for element in &block.elements {
            let height = element.height();
            if height > self.remaining() && !self.at_top() {
                self.new_page();
            }
            self.draw(element);
            self.y += height;
        }
    }

    fn draw(&mut self, element: &Element) {
        match element {
            Element::Line {
                text,
                style,
                indent,
            } => {
                if !text.is_empty() {
                    self.engine
                        .text(text, MARGIN + indent, self.y + style.size, *style);
                }
            }
            Element::Gap(_) => {}
            Element::Figure {
                image,
                width,
                height,
                caption,
            } => {
                match image {
                    Some(image) => self.engine.draw_image(*image, MARGIN, self.y, *width, *height),
                    None => self.placeholder(*width, *height),
                }
                let x = MARGIN + width + FIGURE_GAP;
                let mut y = self.y;
                for line in caption {
                    y += line_height(line.style);
                    self.engine.text(&line.text, x, y - line.style.size * 0.4, line.style);
                }
            }
        }
    }

    fn placeholder(&mut self, width: f32, height: f32) {
        const LABEL: &str = "Image not available";
        let style = TextStyle::new(9.0).color(Color::GREY);
        self.engine.rect(MARGIN, self.y, width, height, Color::GREY);
        let label_x = MARGIN + ((width - text_width(LABEL, style)) / 2.0).max(4.0);
        let label_y = self.y + height / 2.0 + style.size / 2.0;
        self.engine.text(LABEL, label_x, label_y, style);
    }

    /// Stamp every page with `attribution` and "Page X of Y".
    pub fn footers(&mut self, attribution: &str) {
        let style = TextStyle::new(8.0).color(Color::GREY);
        let size = self.engine.page_size();
        let total = self.engine.page_count();
        let y = size.height - MARGIN;

        for index in 0..total {
            self.engine.set_page(index);
            self.engine.text(&to_ascii(attribution), MARGIN, y, style);
            let label = format!("Page {} of {total}", index + 1);
            let x = size.width - MARGIN - text_width(&label, style);
            self.engine.text(&label, x, y, style);
        }
    }
}
