//! Review policy (spec §4.7), grounded stylistically in the teacher's
//! "return first blocking violation" shape, adapted from budget checks
//! to this domain's checks — the original_source has no dedicated
//! review-policy module to translate directly.

use crate::types::{AuctionRecord, FieldKey, FieldMap};
use chrono::Datelike;

const P0_FIELDS: &[FieldKey] = &[
    FieldKey::LotNo,
    FieldKey::AuctionDate,
    FieldKey::AuctionVenue,
    FieldKey::Score,
    FieldKey::FinalBid,
];
const LOW_CONFIDENCE_THRESHOLD: f32 = 0.9;
const MILEAGE_DISCREPANCY_THRESHOLD: i64 = 1000;

/// Evaluate the ordered checks against the assembled record and its
/// source header field map (for per-P0-field confidence lookups), and
/// set `needs_review`/`review_reason` on the record in place.
pub fn evaluate(record: &mut AuctionRecord, header: &FieldMap) {
    let reason = missing_p0(record)
        .or_else(|| low_confidence_p0(record, header))
        .or_else(|| domain_range_violation(record))
        .or_else(|| mileage_cross_check(record));

    match reason {
        Some(reason) => {
            record.needs_review = true;
            record.review_reason = Some(reason);
        }
        None => {
            record.needs_review = false;
            record.review_reason = None;
        }
    }
}

fn missing_p0(record: &AuctionRecord) -> Option<String> {
    let missing: Vec<&str> = P0_FIELDS
        .iter()
        .filter(|field| !p0_present(record, **field))
        .map(|field| p0_name(*field))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(format!("Missing P0 fields: {}", missing.join(", ")))
    }
}

fn p0_present(record: &AuctionRecord, field: FieldKey) -> bool {
    match field {
        FieldKey::LotNo => record.lot_no.is_some(),
        FieldKey::AuctionDate => record.auction_date.is_some(),
        FieldKey::AuctionVenue => record.auction_venue.is_some(),
        FieldKey::Score => record.score.is_some(),
        FieldKey::FinalBid => record.final_bid_yen.is_some(),
        _ => true,
    }
}

fn p0_name(field: FieldKey) -> &'static str {
    match field {
        FieldKey::LotNo => "lot_no",
        FieldKey::AuctionDate => "auction_date",
        FieldKey::AuctionVenue => "auction_venue",
        FieldKey::Score => "score",
        FieldKey::FinalBid => "final_bid_yen",
        _ => "unknown",
    }
}

/// `final_bid_yen`'s confidence is `max(final_bid, bid_start)` per
/// spec's explicit adoption (DESIGN.md Open Question resolution).
fn low_confidence_p0(record: &AuctionRecord, header: &FieldMap) -> Option<String> {
    for field in P0_FIELDS {
        if !p0_present(record, *field) {
            continue;
        }
        let confidence = match field {
            FieldKey::FinalBid => {
                let final_bid = header.get(FieldKey::FinalBid).map(|f| f.confidence).unwrap_or(0.0);
                let bid_start = header.get(FieldKey::BidStart).map(|f| f.confidence).unwrap_or(0.0);
                final_bid.max(bid_start)
            }
            _ => header.get(*field).map(|f| f.confidence).unwrap_or(0.0),
        };
        if confidence < LOW_CONFIDENCE_THRESHOLD {
            return Some(format!("Low confidence on {}", p0_name(*field)));
        }
    }
    None
}

fn domain_range_violation(record: &AuctionRecord) -> Option<String> {
    let current_year = chrono::Utc::now().year();

    if let Some(date) = record.auction_date {
        if date.year() < 1990 || date.year() > current_year + 1 {
            return Some("auction_date out of domain range".to_string());
        }
    }

    if let Some(bid) = record.final_bid_yen {
        if bid <= 0 || bid > 1_000_000_000 {
            return Some("final_bid_yen out of domain range".to_string());
        }
    }

    if let Some(score) = record.score_numeric {
        if !(0.0..=6.0).contains(&score) {
            return Some("score_numeric out of domain range".to_string());
        }
    }

    if let Some(lot_no) = &record.lot_no {
        if !lot_no.chars().any(|c| c.is_ascii_digit()) {
            return Some("lot_no has no digit".to_string());
        }
    }

    None
}

fn mileage_cross_check(record: &AuctionRecord) -> Option<String> {
    let header_mileage = record.mileage_km;
    let sheet_mileage = record.evidence_meta.sheet_mileage_km;

    match (header_mileage, sheet_mileage) {
        (Some(header), Some(sheet)) => {
            if (header - sheet).abs() > MILEAGE_DISCREPANCY_THRESHOLD {
                Some("Mileage discrepancy".to_string())
            } else {
                None
            }
        }
        (Some(_), None) => {
            let confidence = record.mileage_inference_conf.unwrap_or(0.0);
            if confidence < LOW_CONFIDENCE_THRESHOLD {
                Some("Mileage requires sheet confirmation".to_string())
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParsedField;
    use chrono::NaiveDate;

    fn full_record() -> AuctionRecord {
        let mut record = AuctionRecord::default();
        record.lot_no = Some("35408".to_string());
        record.auction_date = NaiveDate::from_ymd_opt(2024, 10, 18);
        record.auction_venue = Some("東京".to_string());
        record.score = Some("4.5".to_string());
        record.score_numeric = Some(4.5);
        record.final_bid_yen = Some(3_040_000);
        record.mileage_km = Some(21_300);
        record.mileage_inference_conf = Some(0.95);
        record
    }

    fn header_with_confidence(confidence: f32) -> FieldMap {
        let mut map = FieldMap::new();
        for field in P0_FIELDS {
            map.insert_raw(*field, ParsedField::text("x", confidence, None, "x"));
        }
        map
    }

    #[test]
    fn clean_record_passes_review() {
        let mut record = full_record();
        let header = header_with_confidence(0.95);
        evaluate(&mut record, &header);
        assert!(!record.needs_review);
        assert!(record.review_reason.is_none());
    }

    #[test]
    fn missing_p0_field_flags_with_reason() {
        let mut record = full_record();
        record.lot_no = None;
        let header = header_with_confidence(0.95);
        evaluate(&mut record, &header);
        assert!(record.needs_review);
        assert!(record.review_reason.unwrap().contains("lot_no"));
    }

    #[test]
    fn low_confidence_p0_flags_before_domain_checks() {
        let mut record = full_record();
        record.final_bid_yen = Some(-5);
        let header = header_with_confidence(0.5);
        evaluate(&mut record, &header);
        assert_eq!(record.review_reason.as_deref(), Some("Low confidence on lot_no"));
    }

    #[test]
    fn final_bid_confidence_uses_max_of_final_and_start() {
        let mut record = full_record();
        let mut header = header_with_confidence(0.95);
        header.insert_raw(FieldKey::FinalBid, ParsedField::text("3040000", 0.3, None, "3040000"));
        header.insert_raw(FieldKey::BidStart, ParsedField::text("2800000", 0.95, None, "2800000"));
        evaluate(&mut record, &header);
        assert!(!record.needs_review);
    }

    #[test]
    fn domain_range_violation_flags_bad_score() {
        let mut record = full_record();
        record.score_numeric = Some(9.0);
        let header = header_with_confidence(0.95);
        evaluate(&mut record, &header);
        assert_eq!(record.review_reason.as_deref(), Some("score_numeric out of domain range"));
    }

    #[test]
    fn mileage_discrepancy_flags_when_over_threshold() {
        let mut record = full_record();
        record.evidence_meta.sheet_mileage_km = Some(25_000);
        let header = header_with_confidence(0.95);
        evaluate(&mut record, &header);
        assert_eq!(record.review_reason.as_deref(), Some("Mileage discrepancy"));
    }

    #[test]
    fn mileage_requires_confirmation_when_only_header_present_and_low_confidence() {
        let mut record = full_record();
        record.mileage_inference_conf = Some(0.5);
        let header = header_with_confidence(0.95);
        evaluate(&mut record, &header);
        assert_eq!(record.review_reason.as_deref(), Some("Mileage requires sheet confirmation"));
    }
}
