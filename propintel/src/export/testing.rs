//! Recording document engine for pipeline tests.

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::engine::{
    Color, DocumentEngine, EngineError, EngineFactory, EngineOptions, ImageRef, PageSize, TextStyle,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text(String),
    Image(ImageRef),
    Rect,
}

#[derive(Debug, Default)]
pub struct Recording {
    pub ops: Vec<Op>,
    pub pages: usize,
    pub options: Option<EngineOptions>,
}

impl Recording {
    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn images(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Image(_))).count()
    }

    pub fn rects(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Rect)).count()
    }

    pub fn has_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }
}

/// Factory whose engines append into a shared [`Recording`].
#[derive(Debug, Default, Clone)]
pub struct RecordingFactory {
    pub recording: Arc<Mutex<Recording>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineFactory for RecordingFactory {
    fn create(&self, options: EngineOptions) -> Box<dyn DocumentEngine> {
        {
            let mut rec = self.recording.lock().unwrap();
            *rec = Recording {
                options: Some(options),
                pages: 1,
                ..Recording::default()
            };
        }
        Box::new(RecordingEngine {
            recording: Arc::clone(&self.recording),
            size: PageSize::A4,
            decoded: Vec::new(),
            output: Vec::new(),
        })
    }
}

struct RecordingEngine {
    recording: Arc<Mutex<Recording>>,
    size: PageSize,
    decoded: Vec<usize>,
    output: Vec<u8>,
}

impl DocumentEngine for RecordingEngine {
    fn page_size(&self) -> PageSize {
        self.size
    }

    fn page_count(&self) -> usize {
        self.recording.lock().unwrap().pages
    }

    fn add_page(&mut self) {
        self.recording.lock().unwrap().pages += 1;
    }

    fn set_page(&mut self, _index: usize) {}

    fn text(&mut self, text: &str, _x: f32, _y: f32, _style: TextStyle) {
        self.output.extend_from_slice(text.as_bytes());
        self.recording
            .lock()
            .unwrap()
            .ops
            .push(Op::Text(text.to_string()));
    }

    fn load_image(&mut self, payload_base64: &str) -> Result<ImageRef, EngineError> {
        let bytes = BASE64
            .decode(payload_base64)
            .map_err(|e| EngineError::InvalidImage(e.to_string()))?;
        if bytes.is_empty() {
            return Err(EngineError::InvalidImage("empty payload".into()));
        }
        self.decoded.push(bytes.len());
        Ok(ImageRef(self.decoded.len() - 1))
    }

    fn draw_image(&mut self, image: ImageRef, _x: f32, _y: f32, _w: f32, _h: f32) {
        self.output.resize(self.output.len() + self.decoded[image.0], 0);
        self.recording.lock().unwrap().ops.push(Op::Image(image));
    }

    fn rect(&mut self, _x: f32, _y: f32, _w: f32, _h: f32, _color: Color) {
        self.recording.lock().unwrap().ops.push(Op::Rect);
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EngineError> {
        Ok(self.output)
    }
}
