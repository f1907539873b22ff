//! Sheet token row-grouping parser (spec §4.4, dedicated "sheet" path),
//! grounded verbatim on original_source `backend/worker/ocr/parsing.py`'s
//! `parse_sheet`, `_find_chassis_patterns`/`_normalize_chassis_value`,
//! `_extract_damage_codes`, and `_extract_block`/`_extract_lane_type`.

use super::normalize::{normalize_alnum, normalize_text};
use super::{group_tokens_by_row, row_bbox};
use crate::types::{FieldKey, FieldMap, ParsedField, Token};
use once_cell::sync::Lazy;
use regex::Regex;

const STOP_LABELS: &[&str] = &[
    "修復歴", "特記", "備考", "装備", "オプション", "走行", "車検", "評価", "セリ結果",
];

/// Parse the free-form sheet body (chassis/mileage/recycle_fee/notes/
/// options/equipment/lane_type), token-by-token plus row-grouped blocks.
pub fn parse_sheet(tokens: &[Token]) -> FieldMap {
    let mut map = FieldMap::new();
    let full_text = tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
    let rows = group_tokens_by_row(tokens);

    if let Some(field) = find_chassis(tokens, &full_text) {
        map.insert_raw(FieldKey::Chassis, field);
    }

    if let Some(field) = find_mileage_sheet(&rows) {
        map.insert_raw(FieldKey::Mileage, field);
    }

    if let Some(field) = find_recycle_fee(&rows) {
        map.insert_raw(FieldKey::RecycleFee, field);
    }

    if let Some(field) = extract_block(&rows, "特記", STOP_LABELS) {
        map.insert_raw(FieldKey::InspectorReport, field);
    }
    if let Some(field) = extract_block(&rows, "備考", STOP_LABELS) {
        map.insert_raw(FieldKey::Notes, field);
    }
    if let Some(field) = extract_block(&rows, "装備", STOP_LABELS) {
        map.insert_raw(FieldKey::Options, field);
    }

    if let Some(codes) = super::values::parse_equipment(Some(&full_text)) {
        map.insert_raw(
            FieldKey::EquipmentCodes,
            ParsedField::text(codes, 0.8, row_bbox(tokens), &full_text),
        );
    }

    if let Some(field) = extract_lane_type(&full_text, tokens) {
        map.insert_raw(FieldKey::LaneType, field);
    }

    map
}

/// VIN / Mercedes-BMW / Porsche / Japanese model-serial chassis patterns,
/// tried longest-match-first with OCR-confusion-tolerant normalization.
static VIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-HJ-NPR-Z0-9]{17}").unwrap());
static MERCEDES_BMW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,3}\d{3,6}\b").unwrap());
static PORSCHE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bWP[01][A-Z0-9]{14}\b").unwrap());
static JP_MODEL_SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ぁ-んァ-ヶー一-龠A-Z]{1,4}[0-9]{2,6}-?[0-9]{3,8}").unwrap());

fn find_chassis(tokens: &[Token], full_text: &str) -> Option<ParsedField> {
    for label in ["車台番号", "シャーシ", "フレーム"] {
        if let Some(pos) = full_text.find(label) {
            let tail = &full_text[pos + label.len()..];
            if let Some(value) = extract_first_chassis_pattern(tail) {
                return Some(ParsedField::text(value.clone(), 0.9, None, &value));
            }
        }
    }

    let mut candidates: Vec<String> = Vec::new();
    if let Some(m) = VIN_RE.find(full_text) {
        candidates.push(m.as_str().to_string());
    }
    if let Some(m) = MERCEDES_BMW_RE.find(full_text) {
        candidates.push(m.as_str().to_string());
    }
    if let Some(m) = PORSCHE_RE.find(full_text) {
        candidates.push(m.as_str().to_string());
    }
    if let Some(m) = JP_MODEL_SERIAL_RE.find(full_text) {
        candidates.push(m.as_str().to_string());
    }
    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
    let best = candidates.into_iter().next()?;
    let normalized = normalize_chassis_value(&best);
    Some(ParsedField {
        value: crate::types::FieldValue::Text(normalized),
        confidence: 0.6,
        bbox: row_bbox(tokens),
        raw: Some(best),
    })
}

fn extract_first_chassis_pattern(text: &str) -> Option<String> {
    for pattern in [&*VIN_RE, &*MERCEDES_BMW_RE, &*PORSCHE_RE, &*JP_MODEL_SERIAL_RE] {
        if let Some(m) = pattern.find(text) {
            return Some(normalize_chassis_value(m.as_str()));
        }
    }
    None
}

/// Fold common OCR digit/letter confusions within a chassis candidate.
fn normalize_chassis_value(value: &str) -> String {
    normalize_alnum(value)
}

fn find_mileage_sheet(rows: &[Vec<Token>]) -> Option<ParsedField> {
    for row in rows {
        let text = row.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join("");
        if text.contains("走行") || text.to_uppercase().contains("KM") {
            let text_norm = normalize_text(&text);
            let (km, _multiplier, raw) = super::values::parse_mileage(Some(&text_norm));
            if let Some(km) = km {
                let confidence = row.iter().map(|t| t.confidence).fold(0.0_f32, f32::max);
                return Some(ParsedField {
                    value: crate::types::FieldValue::Integer(km),
                    confidence,
                    bbox: row_bbox(row),
                    raw,
                });
            }
        }
    }
    None
}

fn find_recycle_fee(rows: &[Vec<Token>]) -> Option<ParsedField> {
    for row in rows {
        let text = row.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join("");
        if text.contains("リサイクル") {
            let text_norm = normalize_text(&text);
            if let Some(value) = super::values::parse_yen(Some(&text_norm)) {
                let confidence = row.iter().map(|t| t.confidence).fold(0.0_f32, f32::max);
                return Some(ParsedField {
                    value: crate::types::FieldValue::Integer(value),
                    confidence,
                    bbox: row_bbox(row),
                    raw: Some(text),
                });
            }
        }
    }
    None
}

/// Concatenate rows from just after `start_label` up to (not including)
/// the next row containing any of `stop_labels`.
fn extract_block(rows: &[Vec<Token>], start_label: &str, stop_labels: &[&str]) -> Option<ParsedField> {
    let start_idx = rows.iter().position(|row| {
        row.iter().any(|t| t.text.contains(start_label))
    })?;

    let mut block_tokens: Vec<Token> = Vec::new();
    for row in &rows[start_idx + 1..] {
        let row_text = row.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join("");
        if stop_labels.iter().any(|stop| *stop != start_label && row_text.contains(stop)) {
            break;
        }
        block_tokens.extend(row.iter().cloned());
    }

    if block_tokens.is_empty() {
        return None;
    }
    let text = block_tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
    let confidence = block_tokens.iter().map(|t| t.confidence).sum::<f32>() / block_tokens.len() as f32;
    Some(ParsedField::text(text.clone(), confidence, row_bbox(&block_tokens), &text))
}

static LANE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(レーン|LANE)\s*[:\s]*([A-Z0-9]{1,3})").unwrap());

fn extract_lane_type(full_text: &str, tokens: &[Token]) -> Option<ParsedField> {
    let text_norm = normalize_text(full_text);
    let caps = LANE_RE.captures(&text_norm)?;
    let value = caps.get(2)?.as_str().to_string();
    Some(ParsedField::text(value.clone(), 0.8, row_bbox(tokens), &value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    fn tok(text: &str, y: f32) -> Token {
        Token::new(text, 0.9, BBox::new(0.0, y, 50.0, y + 20.0))
    }

    #[test]
    fn parse_sheet_extracts_mileage_row() {
        let tokens = vec![tok("走行", 0.0), tok("21,300km", 0.0)];
        let map = parse_sheet(&tokens);
        assert!(map.contains(FieldKey::Mileage));
    }

    #[test]
    fn parse_sheet_extracts_equipment_codes() {
        let tokens = vec![tok("AAC", 0.0), tok("ナビ", 0.0)];
        let map = parse_sheet(&tokens);
        let codes = map.get(FieldKey::EquipmentCodes).unwrap().value.as_text().unwrap().to_string();
        assert!(codes.contains("AAC"));
    }

    #[test]
    fn extract_block_stops_at_next_label() {
        let rows = vec![
            vec![tok("備考", 0.0)],
            vec![tok("フロントバンパー傷あり", 20.0)],
            vec![tok("装備", 40.0)],
            vec![tok("ナビ", 60.0)],
        ];
        let field = extract_block(&rows, "備考", STOP_LABELS).unwrap();
        assert!(field.value.display().contains("フロントバンパー傷あり"));
        assert!(!field.value.display().contains("ナビ"));
    }

    #[test]
    fn lane_type_extracts_value_after_label() {
        let tokens = vec![tok("レーン:A", 0.0)];
        let map = parse_sheet(&tokens);
        assert_eq!(map.get(FieldKey::LaneType).unwrap().value.as_text(), Some("A"));
    }
}
