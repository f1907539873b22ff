//! OCR router (spec §4.3): two-stage routing with fallbacks for the
//! header and sheet crops. Grounded verbatim on original_source
//! `backend/worker/ocr/router.rs`'s value-signal heuristic and rotation
//! search, reworked onto the `VlBackend`/`LineOcrBackend` trait pair.

use super::engine::{LineOcrBackend, VlBackend, VlOptions};
use super::table::interpret_blocks;
use crate::error::PipelineError;
use crate::types::{BBox, OcrResult, Token};
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

const MIN_TOKEN_COUNT: usize = 10;
const VIN_MIN_LEN: usize = 8;
const VIN_MAX_LEN: usize = 17;

pub struct OcrRouter {
    pub vl: Arc<dyn VlBackend>,
    /// Priority-ordered line-OCR adapters, default `["paddle", "tesseract"]`.
    pub line_engines: Vec<Arc<dyn LineOcrBackend>>,
}

impl OcrRouter {
    pub fn new(vl: Arc<dyn VlBackend>, line_engines: Vec<Arc<dyn LineOcrBackend>>) -> Self {
        OcrRouter { vl, line_engines }
    }

    /// Header OCR: VL only; a secondary line-OCR fallback fires only
    /// when VL returned no tokens at all (spec §4.3).
    pub fn route_header(
        &self,
        crop: &DynamicImage,
        origin: (f32, f32),
        lang: &str,
        opts: &VlOptions,
    ) -> Result<OcrResult, PipelineError> {
        let blocks = self.vl.layout(crop, opts)?;
        let (mut tokens, cells) = interpret_blocks(&blocks);

        let mut result = OcrResult {
            engine: self.vl.name().to_string(),
            table_cell_count: cells.len(),
            table_cells: cells,
            vl_tokens: tokens.len(),
            ..Default::default()
        };

        if tokens.is_empty() {
            if let Some(engine) = self.line_engines.first() {
                let fallback_tokens = engine.recognize(crop, lang)?;
                if !fallback_tokens.is_empty() {
                    tokens = fallback_tokens;
                    result.engine = engine.name().to_string();
                    result.fallback = Some("no_vl_tokens".to_string());
                }
            }
        }

        result.tokens = translate_all(tokens, origin);
        Ok(result)
    }

    /// Sheet OCR: VL, then rotation-search line-OCR, then a binarized
    /// retry on a secondary engine, each only if the prior stage's
    /// tokens are insufficient (spec §4.3).
    pub fn route_sheet(
        &self,
        crop: &DynamicImage,
        origin: (f32, f32),
        lang: &str,
        opts: &VlOptions,
    ) -> Result<OcrResult, PipelineError> {
        let blocks = self.vl.layout(crop, opts)?;
        let (tokens, cells) = interpret_blocks(&blocks);
        let vl_low_signal = !has_value_signal(&tokens);

        if tokens.len() >= MIN_TOKEN_COUNT && !vl_low_signal {
            return Ok(OcrResult {
                engine: self.vl.name().to_string(),
                tokens: translate_all(tokens, origin),
                table_cells: cells,
                vl_tokens: tokens.len(),
                ..Default::default()
            });
        }

        let vl_token_count = tokens.len();

        if let Some(primary) = self.line_engines.first() {
            let (rotation_tokens, rotation, fallback_engine) = self.rotation_search(primary.as_ref(), crop, lang)?;
            if rotation_tokens.len() >= MIN_TOKEN_COUNT {
                return Ok(OcrResult {
                    engine: fallback_engine,
                    tokens: translate_all(rotation_tokens, origin),
                    table_cells: cells,
                    rotation,
                    fallback: Some("rotation_search".to_string()),
                    vl_tokens: vl_token_count,
                    vl_low_signal,
                    ..Default::default()
                });
            }

            if let Some(secondary) = self.line_engines.get(1) {
                let binarized = binarize(crop);
                let retry_tokens = secondary.recognize(&binarized, "jpn+eng")?;
                return Ok(OcrResult {
                    engine: secondary.name().to_string(),
                    tokens: translate_all(retry_tokens, origin),
                    table_cells: cells,
                    rotation,
                    fallback: Some("binarized_secondary".to_string()),
                    vl_tokens: vl_token_count,
                    vl_low_signal,
                    ..Default::default()
                });
            }

            return Ok(OcrResult {
                engine: fallback_engine,
                tokens: translate_all(rotation_tokens, origin),
                table_cells: cells,
                rotation,
                fallback: Some("rotation_search".to_string()),
                vl_tokens: vl_token_count,
                vl_low_signal,
                ..Default::default()
            });
        }

        Ok(OcrResult {
            engine: self.vl.name().to_string(),
            tokens: translate_all(tokens, origin),
            table_cells: cells,
            vl_tokens: vl_token_count,
            vl_low_signal,
            ..Default::default()
        })
    }

    /// Run at 0°; if still under threshold, try 90/180/270 and keep the
    /// rotation with the most tokens, mapping bboxes back to the
    /// un-rotated frame (spec §4.3).
    fn rotation_search(
        &self,
        engine: &dyn LineOcrBackend,
        crop: &DynamicImage,
        lang: &str,
    ) -> Result<(Vec<Token>, u16, String), PipelineError> {
        let mut best_tokens = engine.recognize(crop, lang)?;
        let mut best_rotation = 0u16;

        if best_tokens.len() < MIN_TOKEN_COUNT {
            for &angle in &[90u16, 180, 270] {
                let rotated = rotate(crop, angle);
                let tokens = engine.recognize(&rotated, lang)?;
                if tokens.len() > best_tokens.len() {
                    best_tokens = unrotate_tokens(tokens, angle, crop.width(), crop.height());
                    best_rotation = angle;
                }
            }
        }

        Ok((best_tokens, best_rotation, engine.name().to_string()))
    }
}

fn rotate(img: &DynamicImage, angle: u16) -> DynamicImage {
    match angle {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img.clone(),
    }
}

/// Map a token's bbox from the rotated frame back into the original
/// (un-rotated) `orig_w x orig_h` frame by inverting the 90°-step
/// rotation the router applied before calling the engine.
fn unrotate_tokens(tokens: Vec<Token>, angle: u16, orig_w: u32, orig_h: u32) -> Vec<Token> {
    let (ow, oh) = (orig_w as f32, orig_h as f32);
    tokens
        .into_iter()
        .map(|mut t| {
            t.bbox = unrotate_bbox(t.bbox, angle, ow, oh);
            t
        })
        .collect()
}

fn unrotate_bbox(bbox: BBox, angle: u16, orig_w: f32, orig_h: f32) -> BBox {
    // `rotate90` maps (x, y) in the original WxH frame to
    // (orig_h - y, x) in the rotated HxW frame; `rotate270` maps it to
    // (y, orig_w - x). Each branch below inverts the corresponding
    // forward map; 180° is its own inverse.
    match angle {
        90 => {
            let (x0, x1) = (bbox.y0, bbox.y1);
            let (y0, y1) = (orig_h - bbox.x1, orig_h - bbox.x0);
            BBox::new(x0, y0, x1, y1)
        }
        180 => {
            let (x0, y0) = (orig_w - bbox.x1, orig_h - bbox.y1);
            let (x1, y1) = (orig_w - bbox.x0, orig_h - bbox.y0);
            BBox::new(x0, y0, x1, y1)
        }
        270 => {
            let (x0, x1) = (orig_w - bbox.y1, orig_w - bbox.y0);
            let (y0, y1) = (bbox.x0, bbox.x1);
            BBox::new(x0, y0, x1, y1)
        }
        _ => bbox,
    }
}

/// "Value signal" (spec §4.3): at least `max(3, 10%*n)` tokens contain
/// digits, an uppercase run >= 2, or are length >= 6, OR any token
/// contains an 8-17 char VIN-like run.
fn has_value_signal(tokens: &[Token]) -> bool {
    if tokens.is_empty() {
        return false;
    }
    let needed = (tokens.len() as f32 * 0.1).ceil().max(3.0) as usize;
    let matching = tokens.iter().filter(|t| token_looks_valuelike(&t.text)).count();
    if matching >= needed {
        return true;
    }
    tokens.iter().any(|t| has_vin_like_run(&t.text))
}

fn token_looks_valuelike(text: &str) -> bool {
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_upper_run = {
        let mut run = 0;
        let mut max_run = 0;
        for c in text.chars() {
            if c.is_ascii_uppercase() {
                run += 1;
                max_run = max_run.max(run);
            } else {
                run = 0;
            }
        }
        max_run >= 2
    };
    has_digit || has_upper_run || text.chars().count() >= 6
}

/// Any maximal contiguous run of ASCII alphanumerics with length in
/// `[8, 17]` counts as VIN-like (spec §4.3).
fn has_vin_like_run(text: &str) -> bool {
    let mut run_len = 0usize;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            run_len += 1;
            if (VIN_MIN_LEN..=VIN_MAX_LEN).contains(&run_len) {
                return true;
            }
        } else {
            run_len = 0;
        }
    }
    false
}

/// Fixed-threshold binarization, the router's preprocessing variant for
/// the secondary-engine retry (spec §4.3: "optionally binarize and
/// retry a secondary engine").
fn binarize(img: &DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();
    let mut out = gray.clone();
    for (_, _, pixel) in out.enumerate_pixels_mut() {
        pixel[0] = if pixel[0] > 128 { 255 } else { 0 };
    }
    DynamicImage::ImageLuma8(out)
}

fn translate_all(tokens: Vec<Token>, origin: (f32, f32)) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|mut t| {
            t.bbox = t.bbox.translate(origin.0, origin.1);
            t
        })
        .collect()
}
