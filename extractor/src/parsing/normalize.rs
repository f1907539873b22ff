//! Text normalization helpers (spec §4.4), grounded verbatim on
//! original_source `backend/worker/ocr/parsing.py`'s `normalize_text`,
//! `normalize_alnum`, and `normalize_digits`.

use unicode_normalization::UnicodeNormalization;

/// NFKC-normalize, strip ASCII/full-width spaces, and fold full-width
/// colon/slash/minus/comma/period to their ASCII equivalents.
pub fn normalize_text(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    nfkc
        .chars()
        .filter(|&c| c != ' ' && c != '\u{3000}')
        .map(|c| match c {
            '\u{FF1A}' => ':',                                     // ：
            '\u{FF0F}' => '/',                                     // ／
            '\u{30FC}' | '\u{2010}' | '\u{FF0D}' | '\u{2212}' => '-', // ー ‐ － −
            '\u{FF0C}' => ',',                                     // ，
            '\u{FF0E}' => '.',                                     // ．
            other => other,
        })
        .collect()
}

/// NFKC-normalize, uppercase, strip spaces, keep only `[0-9A-Z]`.
pub fn normalize_alnum(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    nfkc.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// NFKC-normalize, translate common OCR digit confusions, keep only digits.
pub fn normalize_digits(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    nfkc.chars()
        .filter_map(|c| match c {
            'O' | 'o' => Some('0'),
            'I' | 'l' | '|' | '!' => Some('1'),
            'S' => Some('5'),
            'B' => Some('8'),
            d if d.is_ascii_digit() => Some(d),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_folds_fullwidth_punctuation_and_digits() {
        assert_eq!(normalize_text("開催日：２０２３／０５"), "開催日:2023/05");
    }

    #[test]
    fn normalize_text_strips_spaces() {
        assert_eq!(normalize_text("東京　都 内"), "東京都内");
    }

    #[test]
    fn normalize_text_folds_dash_variants() {
        assert_eq!(normalize_text("R05ー03"), "R05-03");
        assert_eq!(normalize_text("R05－03"), "R05-03");
    }

    #[test]
    fn normalize_alnum_keeps_only_upper_and_digits() {
        assert_eq!(normalize_alnum("cla 250-x!"), "CLA250X");
    }

    #[test]
    fn normalize_digits_translates_common_confusions() {
        assert_eq!(normalize_digits("2I,3OO"), "21300");
    }
}
