//! ParsedField / FieldMap (spec §3), and the §9 tagged-variant
//! substitution for the original dynamic `value: text|int|decimal|null`.

use super::token::BBox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tagged replacement for the original dynamic `ParsedField.value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Display form used for text-containment bbox resolution in the
    /// merger and for "is this value just a label token" checks.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Null => String::new(),
        }
    }
}

/// The closed set of parser keys (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    AuctionDate,
    AuctionVenue,
    AuctionVenueRound,
    LotNo,
    MakeModel,
    Grade,
    ModelYear,
    ShiftEngine,
    Mileage,
    Inspection,
    Color,
    ModelCode,
    Result,
    StartingBid,
    FinalBid,
    BidStart,
    Score,
    Chassis,
    Notes,
    Options,
    InspectorReport,
    RecycleFee,
    EquipmentCodes,
    LaneType,
}

impl FieldKey {
    pub const ALL: [FieldKey; 24] = [
        FieldKey::AuctionDate,
        FieldKey::AuctionVenue,
        FieldKey::AuctionVenueRound,
        FieldKey::LotNo,
        FieldKey::MakeModel,
        FieldKey::Grade,
        FieldKey::ModelYear,
        FieldKey::ShiftEngine,
        FieldKey::Mileage,
        FieldKey::Inspection,
        FieldKey::Color,
        FieldKey::ModelCode,
        FieldKey::Result,
        FieldKey::StartingBid,
        FieldKey::FinalBid,
        FieldKey::BidStart,
        FieldKey::Score,
        FieldKey::Chassis,
        FieldKey::Notes,
        FieldKey::Options,
        FieldKey::InspectorReport,
        FieldKey::RecycleFee,
        FieldKey::EquipmentCodes,
        FieldKey::LaneType,
    ];
}

/// A single parsed observation for one field (spec §3).
///
/// Invariant: `value == Null` implies the field was not observed;
/// `confidence == 0.0` only when originating from a regex-only fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedField {
    pub value: FieldValue,
    pub confidence: f32,
    pub bbox: Option<BBox>,
    pub raw: Option<String>,
}

impl ParsedField {
    pub fn null() -> Self {
        ParsedField {
            value: FieldValue::Null,
            confidence: 0.0,
            bbox: None,
            raw: None,
        }
    }

    pub fn text(value: impl Into<String>, confidence: f32, bbox: Option<BBox>, raw: impl Into<String>) -> Self {
        ParsedField {
            value: FieldValue::Text(value.into()),
            confidence,
            bbox,
            raw: Some(raw.into()),
        }
    }

    pub fn is_present(&self) -> bool {
        !self.value.is_null()
    }
}

/// Mapping from parser key to ParsedField (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMap(pub HashMap<FieldKey, ParsedField>);

impl FieldMap {
    pub fn new() -> Self {
        FieldMap(HashMap::new())
    }

    pub fn get(&self, key: FieldKey) -> Option<&ParsedField> {
        self.0.get(&key)
    }

    pub fn set(&mut self, key: FieldKey, field: ParsedField) {
        if field.is_present() {
            self.0.insert(key, field);
        } else {
            self.0.remove(&key);
        }
    }

    pub fn insert_raw(&mut self, key: FieldKey, field: ParsedField) {
        self.0.insert(key, field);
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.0.get(&key).map(|f| f.is_present()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_map_drops_null_values_on_set() {
        let mut map = FieldMap::new();
        map.set(FieldKey::LotNo, ParsedField::null());
        assert!(!map.contains(FieldKey::LotNo));
    }

    #[test]
    fn field_map_keeps_present_values() {
        let mut map = FieldMap::new();
        map.set(FieldKey::LotNo, ParsedField::text("35408", 0.9, None, "35408"));
        assert!(map.contains(FieldKey::LotNo));
        assert_eq!(map.get(FieldKey::LotNo).unwrap().value.as_text(), Some("35408"));
    }
}
