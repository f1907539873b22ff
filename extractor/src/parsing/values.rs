//! Scalar value parsers (spec §4.4/§4.6), grounded verbatim on
//! original_source `backend/worker/ocr/date_parsing.py` and the numeric
//! parsers in `parsing.py` (`parse_price_pair`, `parse_yen`,
//! `parse_mileage`, `parse_mileage_header`, `parse_score`,
//! `parse_shift_engine`, `parse_equipment`).

use super::label_map::EQUIPMENT_CODES;
use super::normalize::{normalize_digits, normalize_text};
use crate::types::record::Transmission;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_WITH_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:,\d{3})*").unwrap());
static NUMBER_WITH_COMMAS_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:,\d{3})*(?:\.\d+)?").unwrap());
static REIWA_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"R?(\d{1,2})").unwrap());
static REIWA_YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"R?(\d{1,2})[年/.-](\d{1,2})").unwrap());
static AUCTION_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2,4})[./-](\d{1,2})[./-](\d{1,2})").unwrap());
static TRANSMISSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(AT|FA|CA|CVT)").unwrap());
static ENGINE_CC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{3,4})").unwrap());

/// Reiwa era year -> Gregorian year (spec glossary: Reiwa n = Gregorian n+2018).
pub fn parse_reiwa_year(text: Option<&str>) -> Option<i32> {
    let text = text?;
    let caps = REIWA_YEAR.captures(text)?;
    let n: i32 = caps.get(1)?.as_str().parse().ok()?;
    Some(n + 2018)
}

/// Reiwa year-month -> Gregorian date with day=1.
pub fn parse_reiwa_year_month(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?;
    let caps = REIWA_YEAR_MONTH.captures(text)?;
    let n: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(n + 2018, month, 1)
}

/// `(YY|YYYY)[./-](M)[./-](D)`; two-digit year implies +2000.
pub fn parse_auction_date(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?;
    let caps = AUCTION_DATE.captures(text)?;
    let mut year: i32 = caps.get(1)?.as_str().parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Extract final/start bid numbers from a combined "final start" blob,
/// applying the "万" normalization (values < 100,000 are ×10,000).
pub fn parse_price_pair(text: Option<&str>) -> (Option<i64>, Option<i64>) {
    let Some(text) = text else { return (None, None) };
    let cleaned = normalize_text(text);
    let numbers: Vec<i64> = NUMBER_WITH_COMMAS
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().replace(',', "").parse().ok())
        .collect();
    if numbers.is_empty() {
        return (None, None);
    }
    let mut final_bid = numbers.first().copied();
    let mut start_bid = numbers.get(1).copied();
    if let Some(v) = final_bid.filter(|v| *v < 100_000) {
        final_bid = Some(v * 10_000);
    }
    if let Some(v) = start_bid.filter(|v| *v < 100_000) {
        start_bid = Some(v * 10_000);
    }
    (final_bid, start_bid)
}

/// First comma-grouped number; `< 100,000` is treated as "万" and ×10,000.
pub fn parse_yen(text: Option<&str>) -> Option<i64> {
    let text = text?;
    let cleaned = normalize_text(text);
    let value = if let Some(m) = NUMBER_WITH_COMMAS.find(&cleaned) {
        m.as_str().replace(',', "").parse::<i64>().ok()?
    } else {
        let digits = normalize_digits(&cleaned);
        if digits.is_empty() {
            return None;
        }
        digits.parse::<i64>().ok()?
    };
    if value < 100_000 {
        Some(value * 10_000)
    } else {
        Some(value)
    }
}

/// Sheet-observed mileage: `(mileage_km, multiplier, raw)`.
/// `value < 1000` is assumed to be in thousands (multiplier 1000).
pub fn parse_mileage(text: Option<&str>) -> (Option<i64>, Option<i64>, Option<String>) {
    let Some(text) = text else { return (None, None, None) };
    let cleaned = normalize_text(text);
    let raw = match NUMBER_WITH_COMMAS_DECIMAL.find(&cleaned) {
        Some(m) => m.as_str().to_string(),
        None => {
            let digits = normalize_digits(&cleaned);
            if digits.is_empty() {
                return (None, None, Some(text.to_string()));
            }
            digits
        }
    };
    let value: f64 = raw.replace(',', "").parse().unwrap_or(0.0);
    let multiplier = if value < 1000.0 { 1000 } else { 1 };
    let mileage_km = (value * multiplier as f64) as i64;
    (Some(mileage_km), Some(multiplier), Some(raw))
}

/// Header-observed mileage: `(mileage_km, multiplier, confidence, raw)`
/// per spec §4.6's exact heuristic.
pub fn parse_mileage_header(
    text: Option<&str>,
) -> (Option<i64>, Option<i64>, Option<f32>, Option<String>) {
    let Some(text) = text else { return (None, None, None, None) };
    let cleaned = normalize_text(text);
    let digits = normalize_digits(&cleaned);
    if digits.is_empty() {
        return (None, None, None, Some(text.to_string()));
    }
    if cleaned.contains(',') || digits.len() >= 4 {
        let value: i64 = digits.parse().unwrap_or(0);
        return (Some(value), Some(1), Some(0.95), Some(text.to_string()));
    }
    let value: i64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return (None, None, None, Some(text.to_string())),
    };
    if (0..=300).contains(&value) {
        (Some(value * 1000), Some(1000), Some(0.7), Some(text.to_string()))
    } else {
        (Some(value), Some(1), Some(0.3), Some(text.to_string()))
    }
}

/// `RA`/`R` (case-insensitive) preempt numeric; else `\d(\.\d)?`.
pub fn parse_score(text: Option<&str>) -> (Option<String>, Option<f64>) {
    let Some(text) = text else { return (None, None) };
    let cleaned = normalize_text(text);
    let upper = cleaned.to_uppercase();
    if upper.contains("RA") {
        return (Some("RA".to_string()), None);
    }
    if upper.contains('R') {
        return (Some("R".to_string()), None);
    }
    static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d(?:\.\d)?").unwrap());
    match SCORE_RE.find(&cleaned) {
        Some(m) => {
            let score_str = m.as_str().to_string();
            let numeric = score_str.parse::<f64>().ok();
            (Some(score_str), numeric)
        }
        None => (Some(cleaned), None),
    }
}

/// Transmission token + first 3-4 digit engine cc run.
pub fn parse_shift_engine(text: Option<&str>) -> (Option<Transmission>, Option<i32>) {
    let Some(text) = text else { return (None, None) };
    let cleaned = normalize_text(text);
    let trans = TRANSMISSION_RE.captures(&cleaned).and_then(|c| {
        match c.get(1)?.as_str().to_uppercase().as_str() {
            "AT" => Some(Transmission::At),
            "FA" => Some(Transmission::Fa),
            "CA" => Some(Transmission::Ca),
            "CVT" => Some(Transmission::Cvt),
            _ => None,
        }
    });
    let engine = ENGINE_CC_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1)?.as_str().parse().ok());
    (trans, engine)
}

/// Presence scan over the fixed equipment vocabulary (spec §4.4).
pub fn parse_equipment(text: Option<&str>) -> Option<String> {
    let text = text?;
    let normalized = normalize_text(text);
    let found: Vec<&str> = EQUIPMENT_CODES
        .iter()
        .copied()
        .filter(|code| normalized.contains(code))
        .collect();
    if found.is_empty() {
        None
    } else {
        Some(found.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reiwa_round_trip_matches_spec_n_plus_2018() {
        for n in 1..=10 {
            let greg = parse_reiwa_year(Some(&format!("R{:02}", n))).unwrap();
            assert_eq!(greg, n + 2018);
        }
    }

    #[test]
    fn reiwa_year_month_defaults_day_to_one() {
        let date = parse_reiwa_year_month(Some("R08.03")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn auction_date_two_digit_year_adds_2000() {
        let date = parse_auction_date(Some("24/10/18")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 10, 18).unwrap());
    }

    #[test]
    fn yen_below_threshold_multiplies_by_10000() {
        assert_eq!(parse_yen(Some("1,200")), Some(12_000_000));
    }

    #[test]
    fn yen_idempotence_above_threshold_is_untouched() {
        assert_eq!(parse_yen(Some("3,040,000")), Some(3_040_000));
    }

    #[test]
    fn mileage_header_with_comma_is_multiplier_one() {
        let (km, mult, conf, _) = parse_mileage_header(Some("21,300"));
        assert_eq!(km, Some(21_300));
        assert_eq!(mult, Some(1));
        assert_eq!(conf, Some(0.95));
    }

    #[test]
    fn mileage_header_two_digits_is_multiplier_1000() {
        let (km, mult, conf, _) = parse_mileage_header(Some("85"));
        assert_eq!(km, Some(85_000));
        assert_eq!(mult, Some(1000));
        assert_eq!(conf, Some(0.7));
    }

    #[test]
    fn price_pair_extracts_final_and_start_with_man_normalization() {
        let (final_bid, start) = parse_price_pair(Some("3,040,000 2,800,000"));
        assert_eq!(final_bid, Some(3_040_000));
        assert_eq!(start, Some(2_800_000));
    }

    #[test]
    fn score_r_preempts_numeric() {
        assert_eq!(parse_score(Some("R")), (Some("R".to_string()), None));
    }

    #[test]
    fn score_numeric_parses_decimal() {
        assert_eq!(parse_score(Some("4.5")), (Some("4.5".to_string()), Some(4.5)));
    }

    #[test]
    fn shift_engine_splits_transmission_and_cc() {
        let (trans, cc) = parse_shift_engine(Some("AT 2500"));
        assert_eq!(trans, Some(Transmission::At));
        assert_eq!(cc, Some(2500));
    }

    #[test]
    fn equipment_scan_finds_multiple_codes() {
        let found = parse_equipment(Some("AAC ナビ SR")).unwrap();
        assert!(found.contains("AAC"));
        assert!(found.contains("SR"));
    }
}
