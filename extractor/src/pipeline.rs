//! Top-level pipeline wiring (spec §2): preprocess → roi → ocr →
//! parsing → merge → assemble → review, driven either as a bare
//! function over bytes or through a `Document`'s state machine.

use crate::error::PipelineError;
use crate::ocr::{OcrRouter, VlOptions};
use crate::parsing::{header, sheet};
use crate::storage::ObjectStore;
use crate::types::{AuctionRecord, Document, DocumentState};
use chrono::{DateTime, Utc};
use image::{imageops, DynamicImage, GenericImageView, RgbImage};

/// Run the full pipeline over raw image bytes, returning the assembled,
/// review-evaluated record. No `Document` bookkeeping — see
/// `run_with_document` for the state-machine-integrated entry point.
/// `doc_id`/`evidence_store` are where per-field evidence crops (spec
/// §4.6) get saved; pass `InMemoryObjectStore` for a throwaway run.
pub fn run(
    bytes: &[u8],
    router: &OcrRouter,
    vl_opts: &VlOptions,
    doc_id: &str,
    evidence_store: &dyn ObjectStore,
) -> Result<AuctionRecord, PipelineError> {
    let preprocessed = crate::preprocess::run(bytes)?;
    run_on_image(preprocessed, router, vl_opts, doc_id, evidence_store)
}

fn run_on_image(
    preprocessed: RgbImage,
    router: &OcrRouter,
    vl_opts: &VlOptions,
    doc_id: &str,
    evidence_store: &dyn ObjectStore,
) -> Result<AuctionRecord, PipelineError> {
    let rois = crate::roi::detect(&preprocessed);

    let header_crop = crop(&preprocessed, rois.header_bbox);
    let sheet_crop = crop(&preprocessed, rois.sheet_bbox);

    let header_result = router.route_header(
        &header_crop,
        (rois.header_bbox.x0, rois.header_bbox.y0),
        "jpn",
        vl_opts,
    )?;
    let sheet_result = router.route_sheet(
        &sheet_crop,
        (rois.sheet_bbox.x0, rois.sheet_bbox.y0),
        "jpn",
        vl_opts,
    )?;

    let label_neighborhood = header::label_neighborhood(&header_result.tokens);
    let combined_token = header::combined_token(&header_result.tokens);
    let table = header::table_cell(&header_result.table_cells);
    let mut pattern = header::pattern_scan(&header_result.concatenated_text());
    header::clamp_pattern_scan_confidence(&mut pattern);

    let merged_header = crate::merge::merge_strategies(&table, &label_neighborhood, &combined_token, &pattern);
    let sheet_fields = sheet::parse_sheet(&sheet_result.tokens);

    let full_text = format!("{} {}", header_result.concatenated_text(), sheet_result.concatenated_text());

    let mut record = crate::assemble::assemble_record(
        &merged_header,
        &sheet_fields,
        full_text.trim(),
        Some(header_result.engine.clone()),
        Some(sheet_result.engine.clone()),
    );

    crate::assemble::save_evidence_crops(&mut record, &preprocessed, doc_id, evidence_store)?;
    crate::review::evaluate(&mut record, &merged_header);

    Ok(record)
}

/// Crop `bbox` out of `img`, clamped to the image bounds, and return it
/// as a `DynamicImage` for the OCR router's engine adapters.
fn crop(img: &RgbImage, bbox: crate::types::BBox) -> DynamicImage {
    let (w, h) = img.dimensions();
    let x0 = bbox.x0.round().clamp(0.0, w as f32) as u32;
    let y0 = bbox.y0.round().clamp(0.0, h as f32) as u32;
    let x1 = bbox.x1.round().clamp(x0 as f32, w as f32) as u32;
    let y1 = bbox.y1.round().clamp(y0 as f32, h as f32) as u32;
    let crop_w = (x1 - x0).max(1);
    let crop_h = (y1 - y0).max(1);
    DynamicImage::ImageRgb8(imageops::crop_imm(img, x0, y0, crop_w, crop_h).to_image())
}

/// Drive `doc` through its legal state transitions around the pipeline
/// run: `queued` -> `preprocessing` -> `ocr` -> `extracting` ->
/// `validating` -> `done`, or `failed` on the first error (spec §4.8).
pub fn run_with_document(
    doc: &mut Document,
    bytes: &[u8],
    router: &OcrRouter,
    vl_opts: &VlOptions,
    evidence_store: &dyn ObjectStore,
    now: DateTime<Utc>,
) -> Result<AuctionRecord, PipelineError> {
    doc.transition(DocumentState::Preprocessing, now);
    let preprocessed = match crate::preprocess::run(bytes) {
        Ok(img) => img,
        Err(err) => {
            doc.fail(err.to_string(), now);
            return Err(err);
        }
    };

    doc.transition(DocumentState::Ocr, now);
    let rois = crate::roi::detect(&preprocessed);
    let header_crop = crop(&preprocessed, rois.header_bbox);
    let sheet_crop = crop(&preprocessed, rois.sheet_bbox);

    let header_result = match router.route_header(&header_crop, (rois.header_bbox.x0, rois.header_bbox.y0), "jpn", vl_opts) {
        Ok(r) => r,
        Err(err) => {
            doc.fail(err.to_string(), now);
            return Err(err);
        }
    };
    let sheet_result = match router.route_sheet(&sheet_crop, (rois.sheet_bbox.x0, rois.sheet_bbox.y0), "jpn", vl_opts) {
        Ok(r) => r,
        Err(err) => {
            doc.fail(err.to_string(), now);
            return Err(err);
        }
    };

    doc.transition(DocumentState::Extracting, now);
    let label_neighborhood = header::label_neighborhood(&header_result.tokens);
    let combined_token = header::combined_token(&header_result.tokens);
    let table = header::table_cell(&header_result.table_cells);
    let mut pattern = header::pattern_scan(&header_result.concatenated_text());
    header::clamp_pattern_scan_confidence(&mut pattern);
    let merged_header = crate::merge::merge_strategies(&table, &label_neighborhood, &combined_token, &pattern);
    let sheet_fields = sheet::parse_sheet(&sheet_result.tokens);
    let full_text = format!("{} {}", header_result.concatenated_text(), sheet_result.concatenated_text());
    let mut record = crate::assemble::assemble_record(
        &merged_header,
        &sheet_fields,
        full_text.trim(),
        Some(header_result.engine.clone()),
        Some(sheet_result.engine.clone()),
    );
    if let Err(err) = crate::assemble::save_evidence_crops(&mut record, &preprocessed, &doc.id, evidence_store) {
        doc.fail(err.to_string(), now);
        return Err(err);
    }

    doc.transition(DocumentState::Validating, now);
    crate::review::evaluate(&mut record, &merged_header);

    if record.needs_review {
        doc.transition(DocumentState::Review, now);
    } else {
        doc.transition(DocumentState::Done, now);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::{BlockLabel, LayoutBlock, MockLineOcrBackend, MockVlBackend};
    use crate::storage::InMemoryObjectStore;
    use crate::types::BBox;
    use std::sync::Arc;

    fn sample_png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(2000, 2800, image::Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn router_with_header_blocks(blocks: Vec<LayoutBlock>) -> OcrRouter {
        let vl = Arc::new(MockVlBackend::new(vec![blocks, vec![]]));
        let line = Arc::new(MockLineOcrBackend::new(vec![vec![], vec![], vec![], vec![]]));
        OcrRouter::new(vl, vec![line])
    }

    #[test]
    fn run_produces_a_record_and_never_panics_on_a_blank_image() {
        let bytes = sample_png_bytes();
        let blocks = vec![LayoutBlock {
            label: BlockLabel::Text,
            content: "東京 24/10/18".to_string(),
            bbox: BBox::new(0.0, 0.0, 100.0, 20.0),
        }];
        let router = router_with_header_blocks(blocks);
        let store = InMemoryObjectStore::new();
        let record = run(&bytes, &router, &VlOptions::default(), "doc-1", &store).unwrap();
        assert_eq!(record.auction_venue.as_deref(), Some("東京"));
        let evidence = record.evidence.get("auction_venue").unwrap();
        assert!(evidence.crop_path.is_some());
    }

    #[test]
    fn run_with_document_reaches_done_or_review_not_failed() {
        let bytes = sample_png_bytes();
        let router = router_with_header_blocks(vec![]);
        let store = InMemoryObjectStore::new();
        let now = Utc::now();
        let mut doc = Document::new("doc-1", "v1", now);
        let record = run_with_document(&mut doc, &bytes, &router, &VlOptions::default(), &store, now).unwrap();
        assert!(matches!(doc.status, DocumentState::Done | DocumentState::Review));
        assert!(record.needs_review);
    }

    #[test]
    fn run_with_document_fails_on_decode_error() {
        let router = router_with_header_blocks(vec![]);
        let store = InMemoryObjectStore::new();
        let now = Utc::now();
        let mut doc = Document::new("doc-1", "v1", now);
        let result = run_with_document(&mut doc, b"not an image", &router, &VlOptions::default(), &store, now);
        assert!(result.is_err());
        assert_eq!(doc.status, DocumentState::Failed);
        assert_eq!(doc.retry_count, 1);
    }
}
