//! Address normalization.
//!
//! Mirrors what the reference dataset expects: NFKC width folding, kanji
//! district numbers converted to Arabic immediately before the 丁目 marker,
//! and the literal placeholder 字 removed.

use unicode_normalization::UnicodeNormalization;

/// Kanji numerals that appear as district numbers before 丁目.
/// Only single digits plus 十 occur in practice.
const KANJI_DIGITS: &[(&str, &str)] = &[
    ("一", "1"),
    ("二", "2"),
    ("三", "3"),
    ("四", "4"),
    ("五", "5"),
    ("六", "6"),
    ("七", "7"),
    ("八", "8"),
    ("九", "9"),
    ("十", "10"),
];

/// Normalize an address string for postal lookup.
///
/// Idempotent: normalizing an already-normalized address is a no-op.
pub fn normalize(address: &str) -> String {
    let mut text: String = address.nfkc().collect();

    for (kanji, digit) in KANJI_DIGITS {
        let marker = format!("{kanji}丁目");
        if text.contains(&marker) {
            text = text.replace(&marker, &format!("{digit}丁目"));
        }
    }

    text.replace('字', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_full_width_characters() {
        assert_eq!(normalize("東京都千代田区１－１－１"), "東京都千代田区1-1-1");
    }

    #[test]
    fn converts_kanji_district_numbers() {
        assert_eq!(normalize("大阪市北区梅田一丁目1番"), "大阪市北区梅田1丁目1番");
        assert_eq!(normalize("名古屋市中区栄十丁目"), "名古屋市中区栄10丁目");
    }

    #[test]
    fn leaves_kanji_numbers_without_marker_alone() {
        // 一番町 is a town name, not a district number
        assert_eq!(normalize("千代田区一番町1"), "千代田区一番町1");
    }

    #[test]
    fn strips_aza_placeholder() {
        assert_eq!(normalize("東近江市佐野町字西801"), "東近江市佐野町西801");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "東京都千代田区丸の内１－１－１",
            "大阪市北区梅田一丁目",
            "東近江市佐野町字西801",
            "京都市中京区1-1",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input}");
        }
    }
}
