//! Crate-wide error kinds for the extraction pipeline (spec §7).

use thiserror::Error;

/// The six error kinds a pipeline stage can raise. Each carries a
/// one-line human description suitable for `Document::error_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("no valid header/sheet geometry found: {0}")]
    Roi(String),

    #[error("all OCR engines failed: {0}")]
    Ocr(String),

    #[error("object store error: {0}")]
    Storage(String),

    #[error("record store error: {0}")]
    RecordStore(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
