//! Field merger/arbiter (spec §4.5), grounded verbatim on original_source
//! `backend/worker/ocr/parsing.py`'s `merge_fields`/`_values_match`.

use super::parsing::label_map::LABEL_HINTS;
use crate::types::{BBox, FieldKey, FieldMap, ParsedField};

/// Merge two observations of the same field: confidence is the max of
/// both, the value prefers whichever source is considered primary
/// unless the other is a strict superset match, and the bbox is taken
/// from whichever side's text actually matches the chosen value. A
/// candidate whose value is literally a label token itself (e.g. a
/// value of `開催回`) is rejected in favor of the other side (spec §4.5).
pub fn merge_field(primary: Option<&ParsedField>, secondary: Option<&ParsedField>) -> Option<ParsedField> {
    match (primary, secondary) {
        (None, None) => None,
        (Some(p), None) => valid_or_none(p),
        (None, Some(s)) => valid_or_none(s),
        (Some(p), Some(s)) => {
            let confidence = p.confidence.max(s.confidence);
            let p_valid = is_valid_value(p);
            let s_valid = is_valid_value(s);
            let (value, raw, source_bbox) = if values_match(p, s) {
                if p_valid {
                    (p.value.clone(), p.raw.clone(), p.bbox.or(s.bbox))
                } else {
                    (s.value.clone(), s.raw.clone(), s.bbox.or(p.bbox))
                }
            } else if !p_valid && s_valid {
                (s.value.clone(), s.raw.clone(), s.bbox)
            } else if p_valid && !s_valid {
                (p.value.clone(), p.raw.clone(), p.bbox)
            } else if s.confidence > p.confidence {
                (s.value.clone(), s.raw.clone(), s.bbox)
            } else {
                (p.value.clone(), p.raw.clone(), p.bbox)
            };
            Some(ParsedField { value, confidence, bbox: source_bbox, raw })
        }
    }
}

fn valid_or_none(field: &ParsedField) -> Option<ParsedField> {
    if is_valid_value(field) {
        Some(field.clone())
    } else {
        None
    }
}

/// A value is invalid when it equals (ignoring surrounding whitespace)
/// one of the known label strings itself, meaning the parser grabbed
/// the label instead of its value (spec §4.5).
fn is_valid_value(field: &ParsedField) -> bool {
    if !field.is_present() {
        return false;
    }
    let display = field.value.display();
    let trimmed = display.trim();
    !LABEL_HINTS.iter().any(|label| *label == trimmed)
}

/// Two fields "match" when their display forms are textual substrings
/// of one another (tolerates one side being a trimmed/labeled variant).
fn values_match(a: &ParsedField, b: &ParsedField) -> bool {
    let da = a.value.display();
    let db = b.value.display();
    if da.is_empty() || db.is_empty() {
        return false;
    }
    da == db || da.contains(&db) || db.contains(&da)
}

/// Ordered merge across the four header strategies (spec §4.5): start
/// from table-cell results (lowest confidence floor is already baked
/// into the table-cell parser), layer label-neighborhood, then
/// combined-token, then overlay pattern-scan only where its confidence
/// is >= 0.7 and the field is still missing or was only weakly observed.
pub fn merge_strategies(
    table: &FieldMap,
    label_neighborhood: &FieldMap,
    combined_token: &FieldMap,
    pattern_scan: &FieldMap,
) -> FieldMap {
    let mut merged = FieldMap::new();

    for key in FieldKey::ALL {
        let merged_field = merge_field(table.get(key), label_neighborhood.get(key));
        if let Some(field) = merged_field {
            merged.insert_raw(key, field);
        }
    }

    for key in FieldKey::ALL {
        if let Some(field) = merge_field(merged.get(key), combined_token.get(key)) {
            merged.insert_raw(key, field);
        }
    }

    for key in FieldKey::ALL {
        let Some(scan_field) = pattern_scan.get(key) else { continue };
        if scan_field.confidence < 0.7 {
            continue;
        }
        let should_overlay = match merged.get(key) {
            None => true,
            Some(existing) => !existing.is_present() || existing.confidence < scan_field.confidence,
        };
        if should_overlay {
            merged.insert_raw(key, scan_field.clone());
        }
    }

    merged
}

/// Bbox helper used by the assembler when a merged field's bbox is
/// missing but a fallback region (e.g. the row it was detected in) is
/// available.
pub fn fill_missing_bbox(field: &mut ParsedField, fallback: BBox) {
    if field.bbox.is_none() {
        field.bbox = Some(fallback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_field_prefers_higher_confidence_on_mismatch() {
        let a = ParsedField::text("東京", 0.6, None, "東京");
        let b = ParsedField::text("名古屋", 0.9, None, "名古屋");
        let merged = merge_field(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.value.as_text(), Some("名古屋"));
        assert_eq!(merged.confidence, 0.9);
    }

    #[test]
    fn merge_field_keeps_value_when_substrings_match() {
        let a = ParsedField::text("東京", 0.6, None, "東京");
        let b = ParsedField::text("東京都", 0.9, None, "東京都");
        let merged = merge_field(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.value.as_text(), Some("東京"));
        assert_eq!(merged.confidence, 0.9);
    }

    #[test]
    fn merge_strategies_overlays_pattern_scan_when_missing() {
        let table = FieldMap::new();
        let label = FieldMap::new();
        let combined = FieldMap::new();
        let mut scan = FieldMap::new();
        scan.insert_raw(FieldKey::AuctionVenue, ParsedField::text("東京", 0.8, None, "東京"));
        let merged = merge_strategies(&table, &label, &combined, &scan);
        assert_eq!(merged.get(FieldKey::AuctionVenue).unwrap().value.as_text(), Some("東京"));
    }

    #[test]
    fn merge_strategies_does_not_overlay_low_confidence_pattern_scan() {
        let table = FieldMap::new();
        let label = FieldMap::new();
        let combined = FieldMap::new();
        let mut scan = FieldMap::new();
        scan.insert_raw(FieldKey::AuctionVenue, ParsedField::text("東京", 0.6, None, "東京"));
        let merged = merge_strategies(&table, &label, &combined, &scan);
        assert!(merged.get(FieldKey::AuctionVenue).is_none());
    }

    #[test]
    fn merge_field_rejects_a_value_that_is_itself_a_label_token() {
        let mislabeled = ParsedField::text("開催回", 0.95, None, "開催回");
        let good = ParsedField::text("2057回", 0.6, None, "2057回");
        let merged = merge_field(Some(&mislabeled), Some(&good)).unwrap();
        assert_eq!(merged.value.as_text(), Some("2057回"));
    }

    #[test]
    fn merge_field_returns_none_when_only_candidate_is_a_label_token() {
        let mislabeled = ParsedField::text("会場", 0.9, None, "会場");
        assert!(merge_field(Some(&mislabeled), None).is_none());
    }
}
