pub mod document;
pub mod field;
pub mod record;
pub mod token;

pub use document::{Document, DocumentState};
pub use field::{FieldKey, FieldMap, FieldValue, ParsedField};
pub use record::{AuctionRecord, Evidence, EvidenceMeta, ResultOutcome, Transmission};
pub use token::{BBox, OcrResult, Token};
