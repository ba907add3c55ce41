//! PDF document engine built on `lopdf`.
//!
//! Uses the 14 standard fonts (Helvetica, Helvetica-Bold), so callers must
//! pass ASCII text. Images are decoded, resampled and embedded as raw RGB
//! XObjects; `Document::compress` deflates every stream on finish.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::engine::{
    Color, DocumentEngine, EngineError, EngineFactory, EngineOptions, ImageRef, PageSize, TextStyle,
};

const FONT_REGULAR: &[u8] = b"F1";
const FONT_BOLD: &[u8] = b"F2";

/// Creates [`PdfEngine`]s on A4 pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfEngineFactory;

impl EngineFactory for PdfEngineFactory {
    fn create(&self, options: EngineOptions) -> Box<dyn DocumentEngine> {
        Box::new(PdfEngine::new(PageSize::A4, options))
    }
}

/// Paginated PDF under construction.
pub struct PdfEngine {
    doc: Document,
    size: PageSize,
    pages: Vec<Vec<Operation>>,
    current: usize,
    images: Vec<ObjectId>,
    max_image_px: u32,
}

impl PdfEngine {
    pub fn new(size: PageSize, options: EngineOptions) -> Self {
        Self {
            doc: Document::with_version("1.5"),
            size,
            pages: vec![Vec::new()],
            current: 0,
            images: Vec::new(),
            max_image_px: options.max_image_px.max(1),
        }
    }

    /// Convert a top-left y coordinate to PDF user space.
    fn flip(&self, y: f32) -> f32 {
        self.size.height - y
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        &mut self.pages[self.current]
    }
}

fn color_operands(color: Color) -> Vec<Object> {
    vec![color.r.into(), color.g.into(), color.b.into()]
}

fn name(bytes: &[u8]) -> Object {
    Object::Name(bytes.to_vec())
}

fn image_name(index: usize) -> Vec<u8> {
    format!("Im{index}").into_bytes()
}

impl DocumentEngine for PdfEngine {
    fn page_size(&self) -> PageSize {
        self.size
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.current = self.pages.len() - 1;
    }

    fn set_page(&mut self, index: usize) {
        self.current = index.min(self.pages.len() - 1);
    }

    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) {
        let font = if style.bold { FONT_BOLD } else { FONT_REGULAR };
        let y = self.flip(y);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![name(font), style.size.into()]));
        ops.push(Operation::new("rg", color_operands(style.color)));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    fn load_image(&mut self, payload_base64: &str) -> Result<ImageRef, EngineError> {
        let compact: String = payload_base64.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| EngineError::InvalidImage(format!("bad base64: {e}")))?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|e| EngineError::InvalidImage(e.to_string()))?;

        let (w, h) = decoded.dimensions();
        let decoded = if w.max(h) > self.max_image_px {
            decoded.thumbnail(self.max_image_px, self.max_image_px)
        } else {
            decoded
        };
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            rgb.into_raw(),
        );
        let id = self.doc.add_object(stream);
        self.images.push(id);
        Ok(ImageRef(self.images.len() - 1))
    }

    fn draw_image(&mut self, image: ImageRef, x: f32, y: f32, width: f32, height: f32) {
        let bottom = self.flip(y + height);
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                width.into(),
                0_i64.into(),
                0_i64.into(),
                height.into(),
                x.into(),
                bottom.into(),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(image_name(image.0))]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let bottom = self.flip(y + height);
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("RG", color_operands(color)));
        ops.push(Operation::new("w", vec![0.75_f32.into()]));
        ops.push(Operation::new(
            "re",
            vec![x.into(), bottom.into(), width.into(), height.into()],
        ));
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EngineError> {
        let Self {
            mut doc,
            size,
            pages,
            images,
            ..
        } = *self;

        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut xobjects = Dictionary::new();
        for (index, id) in images.iter().enumerate() {
            xobjects.set(image_name(index), *id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| EngineError::Serialize(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
        let media_box: Vec<Object> = vec![
            0_i64.into(),
            0_i64.into(),
            size.width.into(),
            size.height.into(),
        ];
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| EngineError::Serialize(e.to_string()))?;
        Ok(bytes)
    }
}
