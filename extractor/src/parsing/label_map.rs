//! Label regex catalog (spec §4.4), grounded verbatim on original_source
//! `backend/worker/ocr/parsing.py`'s `LABEL_MAP` / `EQUIPMENT_CODES` and
//! `vl_engine.py`'s `_LABEL_HINTS`.

use crate::types::FieldKey;
use once_cell::sync::Lazy;
use regex::Regex;

/// Parser key -> one or more label regex patterns that identify it.
pub static LABEL_MAP: Lazy<Vec<(FieldKey, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (FieldKey::AuctionDate, vec!["開催日"]),
        (FieldKey::AuctionVenue, vec!["会場"]),
        (FieldKey::AuctionVenueRound, vec!["開催回"]),
        (FieldKey::LotNo, vec!["出品番号"]),
        (FieldKey::MakeModel, vec!["車種名", "車種名/グレード"]),
        (FieldKey::Grade, vec!["グレード"]),
        (FieldKey::ModelYear, vec!["年式"]),
        (FieldKey::ShiftEngine, vec!["シフト/排気量"]),
        (FieldKey::Mileage, vec!["走行"]),
        (FieldKey::Inspection, vec!["車検"]),
        (FieldKey::Color, vec!["色"]),
        (FieldKey::ModelCode, vec!["型式"]),
        (FieldKey::Result, vec!["セリ結果"]),
        (FieldKey::StartingBid, vec!["応札額", "スタート金額", "スタート"]),
        (FieldKey::FinalBid, vec!["落札"]),
        (FieldKey::BidStart, vec!["応札額", "スタート金額"]),
        (FieldKey::Score, vec!["評価点"]),
    ]
});

/// Regexes compiled from `LABEL_MAP`, for direct matching against a
/// normalized token's text.
pub static LABEL_PATTERNS: Lazy<Vec<(FieldKey, Vec<Regex>)>> = Lazy::new(|| {
    LABEL_MAP
        .iter()
        .map(|(key, patterns)| {
            (
                *key,
                patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("static label pattern"))
                    .collect(),
            )
        })
        .collect()
});

/// Closed vocabulary used by the equipment-code presence scan (spec §4.4).
pub const EQUIPMENT_CODES: &[&str] = &["AAC", "ナビ", "SR", "AW", "革", "PS", "PW", "DR"];

/// Hint terms identifying a table's first row as a label row (spec §4.3).
pub const LABEL_HINTS: &[&str] = &[
    "開催日", "出品番号", "会場", "開催回", "年式", "車種名", "グレード", "シフト",
    "排気量", "走行", "車検", "色", "型式", "セリ結果", "応札", "スタート", "評価点",
];

/// Closed venue vocabulary for the pattern-scan fallback (spec §4.4.d).
pub const VENUES: &[&str] = &["東京", "名古屋", "大阪", "福岡", "札幌", "仙台", "広島"];
