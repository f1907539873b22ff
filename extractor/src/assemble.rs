//! Record assembler (spec §4.6), grounded verbatim on original_source
//! `backend/worker/ocr/parsing.py`'s `build_record_fields` and
//! `_parse_lot_venue_round`/`_is_clean_round`/`_extract_damage_codes`.

use crate::error::PipelineError;
use crate::parsing::normalize::{normalize_alnum, normalize_digits};
use crate::parsing::values::{
    parse_auction_date, parse_equipment, parse_price_pair, parse_reiwa_year, parse_reiwa_year_month,
    parse_score, parse_shift_engine, parse_yen,
};
use crate::storage::ObjectStore;
use crate::types::record::{DamageLocation, Evidence, EvidenceMeta, ResultOutcome};
use crate::types::{AuctionRecord, FieldKey, FieldMap, ParsedField};
use image::{imageops, DynamicImage, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;

/// Assemble the final record from the merged header fields and the
/// dedicated sheet parse, plus whichever engines produced each side.
pub fn assemble_record(
    header: &FieldMap,
    sheet: &FieldMap,
    full_text: &str,
    header_engine: Option<String>,
    sheet_engine: Option<String>,
) -> AuctionRecord {
    let mut record = AuctionRecord::default();
    record.full_text = full_text.to_string();

    if let Some(field) = header.get(FieldKey::AuctionDate) {
        record.auction_date = parse_auction_date(field.value.as_text());
    }

    if let Some(field) = header.get(FieldKey::AuctionVenueRound) {
        record.auction_venue_round = field.value.as_text().map(normalize_round);
    }

    if let Some(field) = header.get(FieldKey::LotNo) {
        let digits = normalize_digits(field.value.display().as_str());
        record.lot_no = if digits.is_empty() { field.value.as_text().map(str::to_string) } else { Some(digits) };
    }

    if let Some(field) = header.get(FieldKey::AuctionVenue) {
        if let Some(text) = field.value.as_text() {
            disentangle_venue(text, &mut record);
        }
    }

    if let Some(field) = header.get(FieldKey::MakeModel) {
        let text = field.value.display();
        let (make, model) = split_make_model(&text);
        record.make = make;
        record.model = model;
        record.make_model = Some(text);
    }

    if let Some(field) = header.get(FieldKey::Grade) {
        record.grade = field.value.as_text().map(str::to_string);
    }

    if let Some(field) = header.get(FieldKey::ModelCode) {
        record.model_code = Some(normalize_alnum(&field.value.display()));
    }

    if let Some(field) = sheet.get(FieldKey::Chassis) {
        record.chassis_no = field.value.as_text().map(str::to_string);
    }

    if let Some(field) = header.get(FieldKey::ModelYear) {
        let raw = field.value.display();
        record.model_year_reiwa = Some(raw.clone());
        if let Some(gregorian) = parse_reiwa_year(Some(&raw)) {
            record.model_year_gregorian = Some(gregorian);
            record.year = Some(gregorian);
        }
    }

    if let Some(field) = header.get(FieldKey::Inspection) {
        let raw = field.value.display();
        record.inspection_expiry_raw = Some(raw.clone());
        record.inspection_expiry_month = parse_reiwa_year_month(Some(&raw));
    }

    if let Some(field) = header.get(FieldKey::ShiftEngine) {
        let (transmission, engine_cc) = parse_shift_engine(Some(&field.value.display()));
        record.transmission = transmission;
        record.engine_cc = engine_cc;
    }

    assemble_mileage(header, sheet, &mut record);

    if let Some(field) = header.get(FieldKey::Score) {
        let (score, score_numeric) = parse_score(field.value.as_text());
        record.score = score;
        record.score_numeric = score_numeric;
    }

    if let Some(field) = header.get(FieldKey::Color) {
        record.color = field.value.as_text().map(str::to_string);
    }

    if let Some(field) = header.get(FieldKey::Result) {
        record.result = Some(match field.value.display().as_str() {
            "落札" => ResultOutcome::Sold,
            "流札" | "不成立" => ResultOutcome::Unsold,
            _ => ResultOutcome::Other,
        });
    }

    if let Some(field) = header.get(FieldKey::StartingBid).or_else(|| header.get(FieldKey::BidStart)) {
        record.starting_bid_yen = parse_yen(field.value.as_text());
    }
    if let Some(field) = header.get(FieldKey::FinalBid) {
        record.final_bid_yen = parse_yen(field.value.as_text());
    }
    if record.final_bid_yen.is_none() || record.starting_bid_yen.is_none() {
        if let Some(field) = header.get(FieldKey::BidStart) {
            let (final_pair, start_pair) = parse_price_pair(field.value.as_text());
            record.final_bid_yen = record.final_bid_yen.or(final_pair);
            record.starting_bid_yen = record.starting_bid_yen.or(start_pair);
        }
    }

    if let Some(field) = sheet.get(FieldKey::LaneType) {
        record.lane_type = field.value.as_text().map(str::to_string);
    }

    if let Some(field) = sheet.get(FieldKey::EquipmentCodes) {
        record.equipment_codes = field.value.as_text().map(str::to_string);
    } else if let Some(codes) = parse_equipment(Some(full_text)) {
        record.equipment_codes = Some(codes);
    }

    if let Some(field) = sheet.get(FieldKey::Notes) {
        record.notes_text = field.value.as_text().map(str::to_string);
    }
    if let Some(field) = sheet.get(FieldKey::Options) {
        record.options_text = field.value.as_text().map(str::to_string);
    }
    if let Some(field) = sheet.get(FieldKey::InspectorReport) {
        record.inspector_notes = field.value.as_text().map(str::to_string);
    }

    record.damage_locations = extract_damage_codes(
        &[record.notes_text.as_deref(), record.inspector_notes.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
    );

    record.evidence = collect_evidence(header, "header");
    record.evidence.extend(collect_evidence(sheet, "sheet"));

    let sheet_mileage = sheet.get(FieldKey::Mileage);
    record.evidence_meta = EvidenceMeta {
        header_engine,
        sheet_engine,
        sheet_mileage_km: sheet_mileage.and_then(|f| f.value.as_integer()),
        sheet_mileage_raw: sheet_mileage.and_then(|f| f.raw.clone()),
    };

    record.overall_confidence = mean_header_confidence(header);

    record
}

/// P0-relevant fields per spec §4.6: mean of header ParsedField
/// confidences (Open Question resolved this way — see DESIGN.md).
fn mean_header_confidence(header: &FieldMap) -> Option<f32> {
    let confidences: Vec<f32> = header.0.values().filter(|f| f.is_present()).map(|f| f.confidence).collect();
    if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
    }
}

/// Evidence object-store bucket (spec §4.6: `evidence/<doc_id>/<source>_<key>.png`).
const EVIDENCE_BUCKET: &str = "evidence";

/// Crop the preprocessed image to every evidence bbox and persist it to
/// `store` under `evidence/<doc_id>/<source>_<key>.png`, filling in
/// `crop_path` on each entry that has a bbox. Fields with no bbox (no
/// spatial evidence to crop) keep `crop_path = None`. Split out from
/// `assemble_record` so that function stays a pure FieldMap transform
/// with no image/storage I/O.
pub fn save_evidence_crops(
    record: &mut AuctionRecord,
    image: &RgbImage,
    doc_id: &str,
    store: &dyn ObjectStore,
) -> Result<(), PipelineError> {
    store.ensure_bucket(EVIDENCE_BUCKET)?;
    for (key, evidence) in record.evidence.iter_mut() {
        let Some(bbox) = evidence.bbox else { continue };
        let crop = crop_to_bbox(image, bbox);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(crop).write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        let object_key = format!("{doc_id}/{}_{key}.png", evidence.source);
        store.put(EVIDENCE_BUCKET, &object_key, &bytes)?;
        evidence.crop_path = Some(format!("{EVIDENCE_BUCKET}/{object_key}"));
    }
    Ok(())
}

fn crop_to_bbox(img: &RgbImage, bbox: crate::types::BBox) -> RgbImage {
    use image::GenericImageView;
    let (w, h) = img.dimensions();
    let x0 = bbox.x0.round().clamp(0.0, w as f32) as u32;
    let y0 = bbox.y0.round().clamp(0.0, h as f32) as u32;
    let x1 = bbox.x1.round().clamp(x0 as f32, w as f32) as u32;
    let y1 = bbox.y1.round().clamp(y0 as f32, h as f32) as u32;
    let crop_w = (x1 - x0).max(1);
    let crop_h = (y1 - y0).max(1);
    imageops::crop_imm(img, x0, y0, crop_w, crop_h).to_image()
}

fn collect_evidence(map: &FieldMap, source: &str) -> std::collections::HashMap<String, Evidence> {
    let mut out = std::collections::HashMap::new();
    for (key, field) in &map.0 {
        if !field.is_present() {
            continue;
        }
        out.insert(
            field_key_str(*key).to_string(),
            Evidence {
                value: field.value.display(),
                confidence: field.confidence,
                bbox: field.bbox,
                crop_path: None,
                source: source.to_string(),
            },
        );
    }
    out
}

fn field_key_str(key: FieldKey) -> &'static str {
    match key {
        FieldKey::AuctionDate => "auction_date",
        FieldKey::AuctionVenue => "auction_venue",
        FieldKey::AuctionVenueRound => "auction_venue_round",
        FieldKey::LotNo => "lot_no",
        FieldKey::MakeModel => "make_model",
        FieldKey::Grade => "grade",
        FieldKey::ModelYear => "model_year",
        FieldKey::ShiftEngine => "shift_engine",
        FieldKey::Mileage => "mileage",
        FieldKey::Inspection => "inspection",
        FieldKey::Color => "color",
        FieldKey::ModelCode => "model_code",
        FieldKey::Result => "result",
        FieldKey::StartingBid => "starting_bid",
        FieldKey::FinalBid => "final_bid",
        FieldKey::BidStart => "bid_start",
        FieldKey::Score => "score",
        FieldKey::Chassis => "chassis",
        FieldKey::Notes => "notes",
        FieldKey::Options => "options",
        FieldKey::InspectorReport => "inspector_report",
        FieldKey::RecycleFee => "recycle_fee",
        FieldKey::EquipmentCodes => "equipment_codes",
        FieldKey::LaneType => "lane_type",
    }
}

/// `record.mileage_km` prefers the header-derived value (subject to
/// the ambiguous-multiplier heuristic in `parse_mileage_header`); when
/// the header carries nothing at all, the sheet-observed mileage (its
/// own multiplier heuristic already applied in `parse_mileage`) is
/// used directly per spec §4.6. The sheet value is always kept in
/// `evidence_meta` as well, independent of which side won here, so the
/// review policy's mileage cross-check can compare the two.
fn assemble_mileage(header: &FieldMap, sheet: &FieldMap, record: &mut AuctionRecord) {
    use crate::parsing::values::parse_mileage_header;

    if let Some(field) = header.get(FieldKey::Mileage) {
        let (km, multiplier, confidence, raw) = parse_mileage_header(field.value.as_text());
        record.mileage_km = km;
        record.mileage_multiplier = multiplier;
        record.mileage_raw = raw;
        record.mileage_inference_conf = confidence;
        return;
    }

    if let Some(field) = sheet.get(FieldKey::Mileage) {
        record.mileage_km = field.value.as_integer();
        record.mileage_multiplier = record.mileage_km.map(|km| if km < 1000 { 1000 } else { 1 });
        record.mileage_raw = field.raw.clone();
        record.mileage_inference_conf = Some(field.confidence);
    }
}

fn split_make_model(text: &str) -> (Option<String>, Option<String>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.split_once(' ') {
        Some((make, model)) if !model.trim().is_empty() => {
            (Some(make.to_string()), Some(model.trim().to_string()))
        }
        _ => (Some(trimmed.to_string()), None),
    }
}

/// `\d{2,4}回` -> trimmed `N回`; anything else returned unchanged.
static ROUND_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2,4})").unwrap());

fn normalize_round(raw: &str) -> String {
    match ROUND_DIGITS.find(raw) {
        Some(m) => format!("{}回", m.as_str()),
        None => raw.to_string(),
    }
}

/// Entangled `lot_or_venue_round` blob (spec §4.6): an optional leading
/// 3-8 digit lot number, an optional non-digit venue run, and a trailing
/// `N回` round marker, any of which may be absent.
static LOT_VENUE_ROUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<lot>\d{3,8})?(?P<venue>[^\d]+)?(?P<round>\d+回)?$").unwrap());

/// Venue/round/lot disentanglement (spec §4.6). A venue value with no
/// digits is already clean and is kept as-is. A venue value containing
/// digits (e.g. `東京 2057回`, or a combined lot+venue+round blob) is
/// re-split with `LOT_VENUE_ROUND_RE`, filling only the pieces the
/// record doesn't already have from their own dedicated fields.
fn disentangle_venue(raw: &str, record: &mut AuctionRecord) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        if record.auction_venue.is_none() {
            record.auction_venue = Some(trimmed.to_string());
        }
        return;
    }
    let Some(caps) = LOT_VENUE_ROUND_RE.captures(trimmed) else {
        if record.auction_venue.is_none() {
            record.auction_venue = Some(trimmed.to_string());
        }
        return;
    };
    if record.lot_no.is_none() {
        if let Some(lot) = caps.name("lot") {
            record.lot_no = Some(lot.as_str().to_string());
        }
    }
    if let Some(venue) = caps.name("venue") {
        let venue_text = venue.as_str().trim();
        if !venue_text.is_empty() {
            record.auction_venue = Some(venue_text.to_string());
        }
    }
    if record.auction_venue_round.is_none() {
        if let Some(round) = caps.name("round") {
            record.auction_venue_round = Some(round.as_str().to_string());
        }
    }
}

/// One- or two-letter-plus-digit damage location codes (e.g. `A1`,
/// `U2`, `AB1`) scattered through free-form notes/inspector text.
static DAMAGE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]{1,2}\d").unwrap());

fn extract_damage_codes(text: &str) -> Vec<DamageLocation> {
    let mut seen = std::collections::HashSet::new();
    let mut codes = Vec::new();
    for m in DAMAGE_CODE_RE.find_iter(text) {
        let code = m.as_str().to_string();
        if seen.insert(code.clone()) {
            codes.push(DamageLocation { code });
        }
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    #[test]
    fn assemble_record_fills_date_and_venue() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::AuctionDate, ParsedField::text("24/10/18", 0.9, None, "24/10/18"));
        header.insert_raw(FieldKey::AuctionVenue, ParsedField::text("東京", 0.9, None, "東京"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "東京 24/10/18", Some("vl".into()), None);
        assert_eq!(record.auction_venue.as_deref(), Some("東京"));
        assert!(record.auction_date.is_some());
    }

    #[test]
    fn assemble_record_splits_make_model_grade() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::MakeModel, ParsedField::text("MB CLA250", 0.9, None, "MB CLA250"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.make.as_deref(), Some("MB"));
        assert_eq!(record.model.as_deref(), Some("CLA250"));
    }

    #[test]
    fn assemble_record_uses_header_mileage_and_keeps_sheet_value_for_crosscheck() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::Mileage, ParsedField::text("21,300", 0.6, None, "21,300"));
        let mut sheet = FieldMap::new();
        sheet.insert_raw(
            FieldKey::Mileage,
            ParsedField { value: FieldValue::Integer(25_000), confidence: 0.9, bbox: None, raw: Some("25,000km".into()) },
        );
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.mileage_km, Some(21_300));
        assert_eq!(record.evidence_meta.sheet_mileage_km, Some(25_000));
    }

    #[test]
    fn assemble_record_normalizes_round_suffix() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::AuctionVenueRound, ParsedField::text("2057", 0.9, None, "2057"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.auction_venue_round.as_deref(), Some("2057回"));
    }

    #[test]
    fn assemble_record_extracts_damage_codes_from_notes() {
        let mut sheet = FieldMap::new();
        sheet.insert_raw(FieldKey::Notes, ParsedField::text("A1 キズ U2 へこみ", 0.8, None, "A1 キズ U2 へこみ"));
        let header = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        let codes: Vec<String> = record.damage_locations.iter().map(|d| d.code.clone()).collect();
        assert_eq!(codes, vec!["A1".to_string(), "U2".to_string()]);
    }

    #[test]
    fn assemble_record_splits_venue_with_embedded_round() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::AuctionVenue, ParsedField::text("東京 2057回", 0.9, None, "東京 2057回"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.auction_venue.as_deref(), Some("東京"));
        assert_eq!(record.auction_venue_round.as_deref(), Some("2057回"));
    }

    #[test]
    fn assemble_record_preserves_already_clean_venue() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::AuctionVenue, ParsedField::text("名古屋", 0.9, None, "名古屋"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.auction_venue.as_deref(), Some("名古屋"));
        assert!(record.auction_venue_round.is_none());
    }

    #[test]
    fn assemble_record_falls_back_to_sheet_mileage_when_header_missing() {
        let header = FieldMap::new();
        let mut sheet = FieldMap::new();
        sheet.insert_raw(
            FieldKey::Mileage,
            ParsedField { value: FieldValue::Integer(84_900), confidence: 0.8, bbox: None, raw: Some("84,900km".into()) },
        );
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.mileage_km, Some(84_900));
        assert_eq!(record.mileage_multiplier, Some(1));
        assert_eq!(record.evidence_meta.sheet_mileage_km, Some(84_900));
    }

    #[test]
    fn assemble_record_falls_back_to_price_pair_when_final_and_start_absent() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::BidStart, ParsedField::text("304 280", 0.8, None, "304 280"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.final_bid_yen, Some(3_040_000));
        assert_eq!(record.starting_bid_yen, Some(2_800_000));
    }

    #[test]
    fn assemble_record_keeps_dedicated_bid_fields_over_price_pair_fallback() {
        let mut header = FieldMap::new();
        header.insert_raw(FieldKey::FinalBid, ParsedField::text("3,040,000", 0.9, None, "3,040,000"));
        header.insert_raw(FieldKey::BidStart, ParsedField::text("304 280", 0.8, None, "304 280"));
        let sheet = FieldMap::new();
        let record = assemble_record(&header, &sheet, "", None, None);
        assert_eq!(record.final_bid_yen, Some(3_040_000));
        assert_eq!(record.starting_bid_yen, Some(2_800_000));
    }

    #[test]
    fn extract_damage_codes_keeps_two_letter_prefixes() {
        let codes = extract_damage_codes("AB1 キズ U2 へこみ");
        let codes: Vec<String> = codes.into_iter().map(|d| d.code).collect();
        assert_eq!(codes, vec!["AB1".to_string(), "U2".to_string()]);
    }

    #[test]
    fn save_evidence_crops_writes_png_and_fills_crop_path() {
        use crate::storage::InMemoryObjectStore;
        use crate::types::BBox;

        let mut header = FieldMap::new();
        header.insert_raw(
            FieldKey::AuctionVenue,
            ParsedField::text("東京", 0.9, Some(BBox::new(0.0, 0.0, 10.0, 10.0)), "東京"),
        );
        let sheet = FieldMap::new();
        let mut record = assemble_record(&header, &sheet, "", None, None);
        assert!(record.evidence.get("auction_venue").unwrap().crop_path.is_none());

        let image = RgbImage::from_pixel(100, 100, image::Rgb([255, 255, 255]));
        let store = InMemoryObjectStore::new();
        save_evidence_crops(&mut record, &image, "doc-1", &store).unwrap();

        let evidence = record.evidence.get("auction_venue").unwrap();
        let crop_path = evidence.crop_path.as_ref().unwrap();
        assert_eq!(crop_path, "evidence/doc-1/header_auction_venue.png");
        assert!(store.head("evidence", "doc-1/header_auction_venue.png").unwrap());
    }
}
