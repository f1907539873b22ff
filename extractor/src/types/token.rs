//! Token and OCRResult (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned bounding box in pixel space of the full preprocessed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BBox { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn y_center(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn x_center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Translate by a crop's origin to map ROI-local coordinates into
    /// full-image coordinates (spec §4.3: "every token's bbox is
    /// translated by the crop's origin").
    pub fn translate(&self, dx: f32, dy: f32) -> BBox {
        BBox::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    pub fn to_int(&self) -> (i32, i32, i32, i32) {
        (
            self.x0.round() as i32,
            self.y0.round() as i32,
            self.x1.round() as i32,
            self.y1.round() as i32,
        )
    }
}

/// A single OCR-recognized text span. Immutable after OCR (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Token {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Token {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// The result of running a single OCR engine on a single crop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub engine: String,
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub table_cells: HashMap<String, String>,
    #[serde(default)]
    pub table_cell_count: usize,
    #[serde(default)]
    pub rotation: u16,
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub vl_tokens: usize,
    #[serde(default)]
    pub vl_low_signal: bool,
}

impl OcrResult {
    pub fn concatenated_text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_translate_offsets_both_corners() {
        let bbox = BBox::new(10.0, 10.0, 20.0, 20.0).translate(5.0, 7.0);
        assert_eq!(bbox, BBox::new(15.0, 17.0, 25.0, 27.0));
    }

    #[test]
    fn concatenated_text_joins_with_spaces() {
        let result = OcrResult {
            engine: "mock".into(),
            tokens: vec![
                Token::new("東京", 0.9, BBox::new(0.0, 0.0, 1.0, 1.0)),
                Token::new("2057回", 0.9, BBox::new(0.0, 0.0, 1.0, 1.0)),
            ],
            ..Default::default()
        };
        assert_eq!(result.concatenated_text(), "東京 2057回");
    }
}
