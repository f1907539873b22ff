//! AuctionRecord output schema (spec §3) and evidence/equipment support types.

use super::token::BBox;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Transmission {
    At,
    Mt,
    Cvt,
    Fa,
    Ca,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultOutcome {
    Sold,
    Unsold,
    Other,
}

/// One evidence entry: the source ParsedField plus where its crop lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub value: String,
    pub confidence: f32,
    pub bbox: Option<BBox>,
    pub crop_path: Option<String>,
    pub source: String,
}

/// The fixed `_meta` block the review policy reads (spec §3, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceMeta {
    pub header_engine: Option<String>,
    pub sheet_engine: Option<String>,
    pub sheet_mileage_km: Option<i64>,
    pub sheet_mileage_raw: Option<String>,
}

/// Reference vocabulary for the equipment-code scan (spec §4.4), lifted
/// out to a small reference table mirroring original_source
/// `backend/app/models/equipment.py`'s code+description shape.
pub struct EquipmentCode {
    pub code: &'static str,
    pub description: &'static str,
}

pub const EQUIPMENT_VOCABULARY: &[EquipmentCode] = &[
    EquipmentCode { code: "AAC", description: "auto air conditioning" },
    EquipmentCode { code: "ナビ", description: "navigation system" },
    EquipmentCode { code: "SR", description: "sunroof" },
    EquipmentCode { code: "AW", description: "alloy wheels" },
    EquipmentCode { code: "革", description: "leather seats" },
    EquipmentCode { code: "PS", description: "power steering" },
    EquipmentCode { code: "PW", description: "power windows" },
    EquipmentCode { code: "DR", description: "power door locks" },
];

/// A single damage-location marker recovered from notes/inspector_report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageLocation {
    pub code: String,
}

/// The assembled, reviewable output record (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub auction_date: Option<NaiveDate>,
    pub auction_venue: Option<String>,
    pub auction_venue_round: Option<String>,
    pub lot_no: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub make_model: Option<String>,
    pub grade: Option<String>,
    pub model_code: Option<String>,
    pub chassis_no: Option<String>,
    pub year: Option<i32>,
    pub model_year_reiwa: Option<String>,
    pub model_year_gregorian: Option<i32>,
    pub inspection_expiry_raw: Option<String>,
    pub inspection_expiry_month: Option<NaiveDate>,
    pub engine_cc: Option<i32>,
    pub transmission: Option<Transmission>,
    pub mileage_km: Option<i64>,
    pub mileage_multiplier: Option<i64>,
    pub mileage_raw: Option<String>,
    pub mileage_inference_conf: Option<f32>,
    pub score: Option<String>,
    pub score_numeric: Option<f64>,
    pub color: Option<String>,
    pub result: Option<ResultOutcome>,
    pub starting_bid_yen: Option<i64>,
    pub final_bid_yen: Option<i64>,
    pub lane_type: Option<String>,
    pub equipment_codes: Option<String>,
    pub notes_text: Option<String>,
    pub options_text: Option<String>,
    pub full_text: String,
    pub inspector_notes: Option<String>,
    pub damage_locations: Vec<DamageLocation>,
    pub evidence: HashMap<String, Evidence>,
    pub evidence_meta: EvidenceMeta,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub overall_confidence: Option<f32>,
}

impl AuctionRecord {
    pub fn final_bid_man(&self) -> Option<i64> {
        self.final_bid_yen.map(|v| v / 10_000)
    }

    pub fn starting_bid_man(&self) -> Option<i64> {
        self.starting_bid_yen.map(|v| v / 10_000)
    }
}

/// Fixed CSV export column order (spec §6). The export endpoint itself
/// is external, but the assembler's field names must stay compatible
/// with this contract.
pub const CSV_COLUMNS: &[&str] = &[
    "id",
    "document_id",
    "auction_date",
    "auction_venue",
    "lot_no",
    "make_model",
    "model_code",
    "chassis_no",
    "year",
    "mileage_km",
    "score",
    "final_bid_yen",
    "needs_review",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_bid_man_divides_by_10000() {
        let mut record = AuctionRecord::default();
        record.final_bid_yen = Some(3_040_000);
        assert_eq!(record.final_bid_man(), Some(304));
    }

    #[test]
    fn csv_columns_match_spec_order() {
        assert_eq!(CSV_COLUMNS.len(), 13);
        assert_eq!(CSV_COLUMNS[0], "id");
        assert_eq!(CSV_COLUMNS[12], "needs_review");
    }
}
