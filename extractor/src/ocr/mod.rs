//! Two-stage OCR routing with fallbacks (spec §4.3).

pub mod engine;
pub mod router;
pub mod table;

pub use engine::{BlockLabel, EngineRegistry, LayoutBlock, LineOcrBackend, VlBackend, VlOptions};
pub use router::OcrRouter;
