//! Header field parser strategies (spec §4.4 a-c), grounded verbatim on
//! original_source `backend/worker/ocr/parsing.py`'s `parse_header`,
//! `parse_header_cells`/`_parse_compound_cell`, and
//! `parse_header_tokens_vl`/`_extract_from_combined_token`.

use super::label_map::LABEL_PATTERNS;
use super::normalize::normalize_text;
use super::{group_tokens_by_row, row_bbox};
use crate::types::{BBox, FieldKey, FieldMap, ParsedField, Token};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// (a) Label-neighborhood parser: row-group tokens, scan left-to-right
/// for a label match, prefer an inline value, else the nearest token to
/// the right.
pub fn label_neighborhood(tokens: &[Token]) -> FieldMap {
    let mut map = FieldMap::new();
    let rows = group_tokens_by_row(tokens);
    for (key, patterns) in LABEL_PATTERNS.iter() {
        if map.contains(*key) {
            continue;
        }
        if let Some(field) = find_value_for_label(&rows, patterns) {
            map.insert_raw(*key, field);
        }
    }
    map
}

fn find_value_for_label(rows: &[Vec<Token>], patterns: &[Regex]) -> Option<ParsedField> {
    for row in rows {
        let mut sorted = row.clone();
        sorted.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap());
        for (idx, token) in sorted.iter().enumerate() {
            let text_norm = normalize_text(&token.text);
            if !patterns.iter().any(|p| p.is_match(&text_norm)) {
                continue;
            }
            let mut value = text_norm.clone();
            for pattern in patterns {
                value = pattern.replace_all(&value, "").to_string();
            }
            let value = value.trim_matches(|c| c == ':' || c == '/' || c == ' ').to_string();
            if !value.is_empty() {
                return Some(ParsedField::text(value, token.confidence, Some(token.bbox), &token.text));
            }
            for candidate in &sorted[idx + 1..] {
                if candidate.bbox.x0 > token.bbox.x0 {
                    return Some(ParsedField::text(
                        candidate.text.clone(),
                        candidate.confidence,
                        Some(candidate.bbox),
                        &candidate.text,
                    ));
                }
            }
        }
    }
    None
}

/// (b) Combined-token parser: the VL engine often emits "label value"
/// inside a single token.
pub fn combined_token(tokens: &[Token]) -> FieldMap {
    let mut map = FieldMap::new();
    for token in tokens {
        let text_norm = normalize_text(&token.text);
        extract_combined(&text_norm, token, &mut map);
    }
    map
}

static DATE_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"開催日\s*[:\s]*(\d{2,4}[/.\-]\d{1,2}[/.\-]\d{1,2})").unwrap());
static LOT_LABELED: Lazy<Regex> = Lazy::new(|| Regex::new(r"出品番号\s*[:\s]*(\d{3,8})").unwrap());
static VENUE_LABELED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"会場\s*[:\s]*([\u{4E00}-\u{9FFF}]+)").unwrap());
static ROUND_LABELED: Lazy<Regex> = Lazy::new(|| Regex::new(r"開催回?\s*[:\s]*(\d+回?)").unwrap());
static YEAR_LABELED: Lazy<Regex> = Lazy::new(|| Regex::new(r"年式\s*[:\s]*(R?\d{1,2})").unwrap());

fn extract_combined(text_norm: &str, token: &Token, map: &mut FieldMap) {
    let bbox = Some(token.bbox);

    if let Some(c) = DATE_LABELED.captures(text_norm) {
        set_if_absent(map, FieldKey::AuctionDate, c.get(1).unwrap().as_str(), 0.9, bbox, token);
    }

    if let Some(c) = LOT_LABELED.captures(text_norm) {
        set_if_absent(map, FieldKey::LotNo, c.get(1).unwrap().as_str(), 0.9, bbox, token);
    }

    if let Some(c) = VENUE_LABELED.captures(text_norm) {
        set_if_absent(map, FieldKey::AuctionVenue, c.get(1).unwrap().as_str(), 0.9, bbox, token);
    }

    if let Some(c) = ROUND_LABELED.captures(text_norm) {
        let mut round_val = c.get(1).unwrap().as_str().to_string();
        if !round_val.ends_with('回') {
            round_val.push('回');
        }
        set_if_absent(map, FieldKey::AuctionVenueRound, &round_val, 0.9, bbox, token);
    }

    if let Some(c) = YEAR_LABELED.captures(text_norm) {
        let raw = c.get(1).unwrap().as_str();
        let canon = if raw.starts_with('R') { raw.to_string() } else { format!("R{raw}") };
        set_if_absent(map, FieldKey::ModelYear, &canon, 0.9, bbox, token);
    }

    if text_norm.contains("シフト") || text_norm.contains("排気量") {
        let value: String = text_norm.replace("シフト", " ").replace("排気量", " ").replace('/', " ");
        if let (trans, engine) = super::values::parse_shift_engine(Some(value.trim())) {
            if trans.is_some() || engine.is_some() {
                let trans_str = trans.map(|t| format!("{t:?}").to_uppercase()).unwrap_or_default();
                let engine_str = engine.map(|e| e.to_string()).unwrap_or_default();
                let combined = format!("{trans_str} {engine_str}").trim().to_string();
                set_if_absent(map, FieldKey::ShiftEngine, &combined, 0.85, bbox, token);
            }
        }
    }
}

fn set_if_absent(map: &mut FieldMap, key: FieldKey, value: &str, confidence: f32, bbox: Option<BBox>, token: &Token) {
    if map.contains(key) {
        return;
    }
    map.insert_raw(key, ParsedField::text(value, confidence, bbox, &token.text));
}

/// (c) Table-cell parser: map label -> value cells when `table_cells`
/// has >=8 entries, splitting compound labels per spec §4.4.c.
pub fn table_cell(cells: &HashMap<String, String>) -> FieldMap {
    let mut map = FieldMap::new();
    if cells.len() < 8 {
        return map;
    }
    for (label, value) in cells {
        let label_norm = normalize_text(label);
        let value_norm = normalize_text(value);
        parse_compound_cell(&label_norm, &value_norm, value, &mut map);
    }
    map
}

fn parse_compound_cell(label: &str, value_norm: &str, raw_value: &str, map: &mut FieldMap) {
    let has = |s: &str| label.contains(s);

    if has("車種名") && has("グレード") {
        let (make_model, grade) = split_make_model_grade(value_norm);
        if let Some(mm) = make_model {
            insert_table(map, FieldKey::MakeModel, &mm, raw_value);
        }
        if let Some(g) = grade {
            insert_table(map, FieldKey::Grade, &g, raw_value);
        }
        return;
    }
    if has("車種名") {
        insert_table(map, FieldKey::MakeModel, raw_value, raw_value);
        return;
    }
    if has("グレード") {
        insert_table(map, FieldKey::Grade, raw_value, raw_value);
        return;
    }
    if (has("シフト") || has("ミッション")) && has("排気量") {
        let (trans, engine) = super::values::parse_shift_engine(Some(value_norm));
        if trans.is_some() || engine.is_some() {
            let trans_str = trans.map(|t| format!("{t:?}").to_uppercase()).unwrap_or_default();
            let engine_str = engine.map(|e| e.to_string()).unwrap_or_default();
            insert_table(map, FieldKey::ShiftEngine, &format!("{trans_str} {engine_str}"), raw_value);
        }
        return;
    }
    if has("走行") && has("車検") {
        let (mileage, inspection) = split_mileage_inspection(value_norm);
        if let Some(m) = mileage {
            insert_table(map, FieldKey::Mileage, &m, raw_value);
        }
        if let Some(i) = inspection {
            insert_table(map, FieldKey::Inspection, &i, raw_value);
        }
        return;
    }
    if has("走行") {
        insert_table(map, FieldKey::Mileage, raw_value, raw_value);
        return;
    }
    if has("車検") {
        insert_table(map, FieldKey::Inspection, raw_value, raw_value);
        return;
    }
    if has("型式") {
        let (model_code, _equipment) = split_model_equipment(value_norm);
        if let Some(code) = model_code {
            insert_table(map, FieldKey::ModelCode, &code, raw_value);
        }
        return;
    }
    if (has("応札") || has("落札")) && has("スタート") {
        let (final_bid, start_bid) = split_bids(value_norm);
        if let Some(f) = final_bid {
            insert_table(map, FieldKey::FinalBid, &f, raw_value);
        }
        if let Some(s) = start_bid {
            insert_table(map, FieldKey::BidStart, &s, raw_value);
        }
        return;
    }
    if has("落札") || has("応札額") {
        insert_table(map, FieldKey::FinalBid, raw_value, raw_value);
        return;
    }
    if has("スタート") {
        insert_table(map, FieldKey::StartingBid, raw_value, raw_value);
        return;
    }
    if has("セリ結果") || has("結果") {
        insert_table(map, FieldKey::Result, raw_value, raw_value);
        return;
    }
    if has("評価") || has("点") {
        let (score, _numeric) = super::values::parse_score(Some(value_norm));
        if let Some(s) = score {
            insert_table(map, FieldKey::Score, &s, raw_value);
        }
        return;
    }
    if has("色") {
        insert_table(map, FieldKey::Color, raw_value, raw_value);
    }
}

fn insert_table(map: &mut FieldMap, key: FieldKey, value: &str, raw: &str) {
    if map.contains(key) {
        return;
    }
    map.insert_raw(key, ParsedField::text(value, 0.95, None, raw));
}

/// Grade-prefix pattern catalog (spec §4.4.c), grounded verbatim on
/// original_source `parsing.py`'s `_split_make_model_grade` pattern
/// list: tried in order, first match whose make/model side actually
/// looks like a make/model (Japanese script or a known make token)
/// wins.
static GRADE_SPLIT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^(.+?)\s+([A-Z]{1,3}\d{2,4}[A-Z]?\s*.*)$").unwrap(),
        Regex::new(r"(?i)^(.+?)\s+([A-Z]{1,3}(?:\s+.*)?)$").unwrap(),
        Regex::new(r"^(.+?)\s+(バージョン.*)$").unwrap(),
        Regex::new(r"(?i)^(.+?)\s+(Fスポーツ.*)$").unwrap(),
        Regex::new(r"(?i)^(.+?)\s+(Mスポ.*)$").unwrap(),
        Regex::new(r"(?i)^(.+?)\s+(AMG.*)$").unwrap(),
        Regex::new(r"^(.+?)\s+(レザー.*)$").unwrap(),
        Regex::new(r"^(.+?)\s+(Cパッケージ.*)$").unwrap(),
    ]
});

static MAKE_MODEL_HINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{3040}-\u{309F}\u{30A0}-\u{30FF}\u{4E00}-\u{9FFF}]|MB|BMW|ポル|GR").unwrap());

static WHITESPACE_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn split_make_model_grade(value: &str) -> (Option<String>, Option<String>) {
    let value = value.trim();
    if value.is_empty() {
        return (None, None);
    }

    for pattern in GRADE_SPLIT_PATTERNS.iter() {
        let Some(caps) = pattern.captures(value) else { continue };
        let make_model = caps.get(1).unwrap().as_str().trim();
        let grade = caps.get(2).unwrap().as_str().trim();
        if MAKE_MODEL_HINT_RE.is_match(make_model) {
            return (Some(make_model.to_string()), Some(grade.to_string()));
        }
    }

    let mut parts = WHITESPACE_SPLIT_RE.splitn(value, 2);
    match (parts.next(), parts.next()) {
        (Some(make_model), Some(grade)) if !grade.trim().is_empty() => {
            (Some(make_model.trim().to_string()), Some(grade.trim().to_string()))
        }
        _ => (Some(value.to_string()), None),
    }
}

fn split_mileage_inspection(value: &str) -> (Option<String>, Option<String>) {
    static MILEAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").unwrap());
    static INSPECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"R\d{1,2}[./年]\d{1,2}").unwrap());
    let mileage = MILEAGE_RE.find(value).map(|m| m.as_str().to_string());
    let inspection = INSPECTION_RE.find(value).map(|m| m.as_str().to_string());
    (mileage, inspection)
}

fn split_model_equipment(value: &str) -> (Option<String>, Option<String>) {
    static MODEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z0-9]{3,12})").unwrap());
    if let Some(m) = MODEL_RE.find(value) {
        let code = m.as_str().to_string();
        let remainder = value[code.len()..].trim().to_string();
        let equipment = if remainder.is_empty() { None } else { Some(remainder) };
        (Some(code), equipment)
    } else {
        (None, None)
    }
}

fn split_bids(value: &str) -> (Option<String>, Option<String>) {
    static NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").unwrap());
    let numbers: Vec<String> = NUM_RE.find_iter(value).map(|m| m.as_str().to_string()).collect();
    (numbers.first().cloned(), numbers.get(1).cloned())
}

/// (d) Pattern-scan fallback: scan concatenated text for canonical forms.
pub fn pattern_scan(full_text: &str) -> FieldMap {
    let mut map = FieldMap::new();
    let text_norm = normalize_text(full_text);

    static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2,4}[/.\-]\d{1,2}[/.\-]\d{1,2}").unwrap());
    if let Some(m) = DATE_RE.find(&text_norm) {
        map.insert_raw(FieldKey::AuctionDate, ParsedField::text(m.as_str(), 0.7, None, m.as_str()));
    }

    for venue in super::label_map::VENUES {
        if full_text.contains(venue) {
            map.insert_raw(FieldKey::AuctionVenue, ParsedField::text(*venue, 0.8, None, *venue));
            break;
        }
    }

    static ROUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,4}回").unwrap());
    if let Some(m) = ROUND_RE.find(&text_norm) {
        map.insert_raw(FieldKey::AuctionVenueRound, ParsedField::text(m.as_str(), 0.8, None, m.as_str()));
    }

    static LOT_LABELED_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"出品番号\s*[:\s]*(\d{4,6})").unwrap());
    static LOT_STANDALONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4,6})\b").unwrap());
    if let Some(c) = LOT_LABELED_RE.captures(&text_norm) {
        map.insert_raw(
            FieldKey::LotNo,
            ParsedField::text(c.get(1).unwrap().as_str(), 0.8, None, c.get(0).unwrap().as_str()),
        );
    } else {
        for m in LOT_STANDALONE_RE.find_iter(&text_norm) {
            let candidate = m.as_str();
            let followed_by_round = text_norm.contains(&format!("{candidate}回"));
            if followed_by_round {
                continue;
            }
            map.insert_raw(FieldKey::LotNo, ParsedField::text(candidate, 0.6, None, candidate));
            break;
        }
    }

    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bR\s*(\d{1,2})").unwrap());
    if let Some(c) = YEAR_RE.captures(&text_norm) {
        let rest = &text_norm[c.get(0).unwrap().end()..];
        let year_val: u32 = c.get(1).unwrap().as_str().parse().unwrap_or(0);
        if (1..=10).contains(&year_val) && !rest.starts_with('回') {
            map.insert_raw(
                FieldKey::ModelYear,
                ParsedField::text(format!("R{year_val:02}"), 0.8, None, c.get(0).unwrap().as_str()),
            );
        }
    }

    let (trans, engine) = super::values::parse_shift_engine(Some(&text_norm));
    if trans.is_some() {
        let trans_str = trans.map(|t| format!("{t:?}").to_uppercase()).unwrap_or_default();
        let engine_str = engine.map(|e| e.to_string()).unwrap_or_default();
        map.insert_raw(
            FieldKey::ShiftEngine,
            ParsedField::text(format!("{trans_str} {engine_str}").trim(), 0.7, None, &text_norm),
        );
    }

    static RA_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(RA?)\b").unwrap());
    if text_norm.contains("評価") {
        if let Some(c) = RA_CONTEXT_RE.captures(&text_norm.to_uppercase()) {
            map.insert_raw(
                FieldKey::Score,
                ParsedField::text(c.get(1).unwrap().as_str(), 0.7, None, c.get(0).unwrap().as_str()),
            );
        }
    }
    if !map.contains(FieldKey::Score) {
        static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([1-5](?:\.[05])?)\b").unwrap());
        if let Some(c) = SCORE_RE.captures(&text_norm) {
            map.insert_raw(
                FieldKey::Score,
                ParsedField::text(c.get(1).unwrap().as_str(), 0.6, None, c.get(0).unwrap().as_str()),
            );
        }
    }

    if full_text.contains("落札") {
        map.insert_raw(FieldKey::Result, ParsedField::text("落札", 0.9, None, "落札"));
    } else if full_text.contains("流札") {
        map.insert_raw(FieldKey::Result, ParsedField::text("流札", 0.9, None, "流札"));
    }

    static MAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,4}(?:,\d{3})*)万").unwrap());
    static LARGE_NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{7,9}").unwrap());
    if let Some(c) = MAN_RE.captures(&text_norm) {
        let digits = c.get(1).unwrap().as_str().replace(',', "");
        map.insert_raw(FieldKey::FinalBid, ParsedField::text(digits, 0.7, None, c.get(0).unwrap().as_str()));
    } else if let Some(m) = LARGE_NUM_RE.find(&text_norm) {
        map.insert_raw(FieldKey::FinalBid, ParsedField::text(m.as_str(), 0.5, None, m.as_str()));
    }

    const COLORS: &[&str] = &[
        "パール", "ホワイト", "ブラック", "クロ", "グレー", "シルバー", "レッド", "ブルー", "ゴールド",
        "ベージュ", "ブラウン",
    ];
    for color in COLORS {
        if full_text.contains(color) {
            map.insert_raw(FieldKey::Color, ParsedField::text(*color, 0.8, None, *color));
            break;
        }
    }

    static MILEAGE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(\d{2,6})(?:,\d{3})*\s*(?:km|㎞|ｋｍ)").unwrap());
    if let Some(c) = MILEAGE_RE.captures(&text_norm) {
        map.insert_raw(
            FieldKey::Mileage,
            ParsedField::text(c.get(1).unwrap().as_str(), 0.7, None, c.get(0).unwrap().as_str()),
        );
    }

    static INSPECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"R\s*(\d{1,2})[./](\d{1,2})").unwrap());
    if let Some(c) = INSPECTION_RE.captures(&text_norm) {
        let year = c.get(1).unwrap().as_str();
        let month = c.get(2).unwrap().as_str();
        map.insert_raw(
            FieldKey::Inspection,
            ParsedField::text(format!("R{year:0>2}.{month:0>2}"), 0.7, None, c.get(0).unwrap().as_str()),
        );
    }

    static MODEL_CODE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
        vec![
            Regex::new(r"\b([A-Z]{2,4}\d{1,3}[A-Z]?)\b").unwrap(),
            Regex::new(r"\b(\d{5,6}[A-Z])\b").unwrap(),
            Regex::new(r"\b([A-Z]\d[A-Z]{2})\b").unwrap(),
        ]
    });
    for pattern in MODEL_CODE_RES.iter() {
        if let Some(c) = pattern.captures(&text_norm) {
            let code = c.get(1).unwrap().as_str();
            if code.len() <= 10 {
                map.insert_raw(FieldKey::ModelCode, ParsedField::text(code, 0.6, None, code));
                break;
            }
        }
    }

    for field in map.0.values_mut() {
        field.confidence = field.confidence.clamp(0.5, 0.8).max(field.confidence.min(0.9));
    }
    map
}

/// Apply per spec §4.4.d confidence band (0.5-0.8); the pattern-scan
/// strategy itself assigns per-pattern confidences already within that
/// band except the 0.9 result markers, which the merger treats as the
/// strongest pattern-scan signal available.
pub fn clamp_pattern_scan_confidence(map: &mut FieldMap) {
    for field in map.0.values_mut() {
        field.confidence = field.confidence.clamp(0.5, 0.9);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBox;

    #[test]
    fn label_neighborhood_finds_inline_value() {
        let tokens = vec![Token::new("会場:東京", 0.9, BBox::new(0.0, 0.0, 50.0, 20.0))];
        let map = label_neighborhood(&tokens);
        assert_eq!(map.get(FieldKey::AuctionVenue).unwrap().value.as_text(), Some("東京"));
    }

    #[test]
    fn label_neighborhood_finds_right_neighbor_value() {
        let tokens = vec![
            Token::new("会場", 0.9, BBox::new(0.0, 0.0, 30.0, 20.0)),
            Token::new("東京", 0.9, BBox::new(40.0, 0.0, 70.0, 20.0)),
        ];
        let map = label_neighborhood(&tokens);
        assert_eq!(map.get(FieldKey::AuctionVenue).unwrap().value.as_text(), Some("東京"));
    }

    #[test]
    fn combined_token_extracts_lot_no() {
        let tokens = vec![Token::new("出品番号 35408", 0.9, BBox::new(0.0, 0.0, 10.0, 10.0))];
        let map = combined_token(&tokens);
        assert_eq!(map.get(FieldKey::LotNo).unwrap().value.as_text(), Some("35408"));
    }

    #[test]
    fn table_cell_requires_at_least_8_cells() {
        let mut cells = HashMap::new();
        cells.insert("会場".to_string(), "東京".to_string());
        let map = table_cell(&cells);
        assert!(map.0.is_empty());
    }

    #[test]
    fn table_cell_splits_compound_make_model_grade() {
        let mut cells = HashMap::new();
        for (k, v) in [
            ("車種名/グレード", "MB CLA250"),
            ("開催日", "24/10/18"),
            ("会場", "東京"),
            ("出品番号", "35408"),
            ("年式", "R05"),
            ("シフト/排気量", "AT 2500"),
            ("走行/車検", "21300 R08.03"),
            ("応札額/スタート金額", "3040000 2800000"),
        ] {
            cells.insert(k.to_string(), v.to_string());
        }
        let map = table_cell(&cells);
        assert!(map.contains(FieldKey::MakeModel));
        assert!(map.contains(FieldKey::Grade));
    }

    #[test]
    fn split_make_model_grade_handles_two_word_make_model() {
        let (make_model, grade) = split_make_model_grade("ポル タイカン GTS 4+1シート");
        assert_eq!(make_model.as_deref(), Some("ポル タイカン"));
        assert_eq!(grade.as_deref(), Some("GTS 4+1シート"));
    }

    #[test]
    fn split_make_model_grade_handles_version_keyword() {
        let (make_model, grade) = split_make_model_grade("MB CLAクラス バージョン2");
        assert_eq!(make_model.as_deref(), Some("MB CLAクラス"));
        assert_eq!(grade.as_deref(), Some("バージョン2"));
    }

    #[test]
    fn split_make_model_grade_falls_back_to_whitespace_split() {
        let (make_model, grade) = split_make_model_grade("TOYOTA COROLLA");
        assert_eq!(make_model.as_deref(), Some("TOYOTA"));
        assert_eq!(grade.as_deref(), Some("COROLLA"));
    }

    #[test]
    fn pattern_scan_finds_round_and_venue() {
        let map = pattern_scan("東京 2057回");
        assert_eq!(map.get(FieldKey::AuctionVenue).unwrap().value.as_text(), Some("東京"));
        assert_eq!(map.get(FieldKey::AuctionVenueRound).unwrap().value.as_text(), Some("2057回"));
    }
}
