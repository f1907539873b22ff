//! OCR engine adapter contract (spec §4.3, §6), grounded in
//! `other_examples/.../measurementor__...ocr.rs.rs`'s `Recognizer` trait
//! and the teacher's `model_catalog::try_get_global_catalog` init-once
//! singleton pattern (SPEC_FULL §4.3).
//!
//! Concrete engines (a real VL model server, `paddleocr`/`tesseract`
//! subprocess adapters) are external services per spec §1/§6 — this
//! module only defines the trait boundary and a process-wide registry
//! for whichever adapters a deployment wires in. Tests and the CLI use
//! the `Mock*` adapters below.

use crate::types::{BBox, Token};
use image::DynamicImage;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// A VL-engine layout block label (spec §4.3: "layout blocks with
/// labels (`text`, `table`, `image`, etc.)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLabel {
    Text,
    Table,
    Image,
    Other,
}

/// One VL-engine layout block: a label, its content (plain text, or an
/// HTML `<table>` fragment for `Table` blocks), and its polygon
/// collapsed to an axis-aligned bbox, in the crop's local coordinates.
#[derive(Debug, Clone)]
pub struct LayoutBlock {
    pub label: BlockLabel,
    pub content: String,
    pub bbox: BBox,
}

/// VL tunables (spec §6 Configuration).
#[derive(Debug, Clone, Copy)]
pub struct VlOptions {
    pub max_new_tokens: u32,
    pub max_pixels: u32,
    pub min_pixels: Option<u32>,
    pub use_ocr_for_image_block: bool,
}

impl Default for VlOptions {
    fn default() -> Self {
        VlOptions {
            max_new_tokens: 128,
            max_pixels: 400_000,
            min_pixels: None,
            use_ocr_for_image_block: true,
        }
    }
}

/// The vision-language layout parser adapter (spec glossary: "VL
/// engine"). Returns raw layout blocks in the crop's local coordinate
/// space; the router is responsible for interpreting them into tokens
/// and for translating bboxes into full-image coordinates.
pub trait VlBackend: Send + Sync {
    fn name(&self) -> &str;
    fn layout(&self, crop: &DynamicImage, opts: &VlOptions) -> Result<Vec<LayoutBlock>, crate::error::PipelineError>;
}

/// The traditional line-OCR adapter (spec glossary: "Line-OCR engine").
/// Returns tokens in the crop's local coordinate space (not yet offset
/// by the crop origin, and not yet un-rotated if the caller rotated the
/// crop before calling).
pub trait LineOcrBackend: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, crop: &DynamicImage, lang: &str) -> Result<Vec<Token>, crate::error::PipelineError>;
}

/// Process-wide engine handles, initialized once and never mutated
/// afterward (spec §5: "OCR engine handles (initialize-once per
/// process, mutate-never after init)").
pub struct EngineRegistry {
    pub vl: Arc<dyn VlBackend>,
    pub line_engines: Vec<Arc<dyn LineOcrBackend>>,
}

static REGISTRY: OnceCell<EngineRegistry> = OnceCell::new();

/// Install the process-wide registry. Only the first call wins; later
/// calls are no-ops, matching the teacher's `try_get_global_catalog`
/// lazy-init-once idiom.
pub fn install_registry(registry: EngineRegistry) {
    let _ = REGISTRY.set(registry);
}

pub fn global_registry() -> Option<&'static EngineRegistry> {
    REGISTRY.get()
}

/// A configurable VL double for tests: returns whatever layout blocks
/// were pre-loaded for the (approximate) crop size requested, keyed by
/// insertion order since tests drive one crop at a time.
#[derive(Default)]
pub struct MockVlBackend {
    pub responses: std::sync::Mutex<std::collections::VecDeque<Vec<LayoutBlock>>>,
}

impl MockVlBackend {
    pub fn new(responses: Vec<Vec<LayoutBlock>>) -> Self {
        MockVlBackend {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl VlBackend for MockVlBackend {
    fn name(&self) -> &str {
        "mock-vl"
    }

    fn layout(&self, _crop: &DynamicImage, _opts: &VlOptions) -> Result<Vec<LayoutBlock>, crate::error::PipelineError> {
        let mut queue = self.responses.lock().unwrap();
        Ok(queue.pop_front().unwrap_or_default())
    }
}

/// A configurable line-OCR double for tests: each call to `recognize`
/// pops the next pre-loaded response off a queue, so a rotation-search
/// test can preload one response per angle the router will try (in
/// order: 0°, 90°, 180°, 270°) and assert the router keeps the best one.
#[derive(Default)]
pub struct MockLineOcrBackend {
    pub responses: std::sync::Mutex<std::collections::VecDeque<Vec<Token>>>,
}

impl MockLineOcrBackend {
    pub fn new(responses: Vec<Vec<Token>>) -> Self {
        MockLineOcrBackend {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl LineOcrBackend for MockLineOcrBackend {
    fn name(&self) -> &str {
        "mock-line-ocr"
    }

    fn recognize(&self, _crop: &DynamicImage, _lang: &str) -> Result<Vec<Token>, crate::error::PipelineError> {
        let mut queue = self.responses.lock().unwrap();
        Ok(queue.pop_front().unwrap_or_default())
    }
}
