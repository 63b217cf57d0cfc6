//! KEN_ALL reference table loading and lookup.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::{normalize, PostalError};
use crate::models::PostalCodeEntry;

/// Sentinel written to the output table when no postal code matched.
pub const NOT_FOUND_SENTINEL: &str = "該当なし";

/// KEN_ALL column count (area code, change flag, postal code, three kana
/// fields, three standard-script fields, six flags).
const KEN_ALL_COLUMNS: usize = 15;

/// Result of a postal lookup for a well-formed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostalCodeResult {
    /// 7-digit code formatted `NNN-NNNN`.
    Found(String),
    NotFound,
}

impl PostalCodeResult {
    /// Field value for the output table.
    pub fn as_csv_field(&self) -> &str {
        match self {
            Self::Found(code) => code,
            Self::NotFound => NOT_FOUND_SENTINEL,
        }
    }
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.{2}[都道府県])(.+?[市区町村])(.+)$").expect("valid address pattern")
    })
}

/// In-memory postal reference table.
///
/// Loaded once per process and shared via `Arc`; lookups are read-only.
pub struct PostalTable {
    entries: Vec<PostalCodeEntry>,
}

impl PostalTable {
    /// Load the Shift_JIS KEN_ALL.CSV dataset.
    pub fn load(path: &Path) -> Result<Self, PostalError> {
        let bytes = std::fs::read(path)?;
        let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&bytes);
        if had_errors {
            warn!("reference dataset at {} had undecodable bytes", path.display());
        }
        let table = Self::from_reader(decoded.as_bytes())?;
        debug!("loaded {} postal reference rows", table.entries.len());
        Ok(table)
    }

    /// Parse an already-decoded (UTF-8) KEN_ALL stream.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, PostalError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.len() < KEN_ALL_COLUMNS {
                return Err(PostalError::ShortRow {
                    expected: KEN_ALL_COLUMNS,
                    got: record.len(),
                });
            }
            entries.push(PostalCodeEntry {
                code: record[2].to_string(),
                prefecture_kana: record[3].to_string(),
                city_kana: record[4].to_string(),
                town_kana: record[5].to_string(),
                prefecture: record[6].to_string(),
                city: record[7].to_string(),
                town: record[8].to_string(),
            });
        }
        Ok(Self { entries })
    }

    /// Build a table from rows directly (used by tests and tooling).
    pub fn from_entries(entries: Vec<PostalCodeEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve an address to a postal code.
    ///
    /// Exact (prefecture, city, town) match first, then a substring fallback
    /// on the town field. First row in table order wins on ties; the
    /// fallback has no stronger tie-break (known limitation of the source
    /// dataset semantics).
    pub fn lookup(&self, address: &str) -> Result<PostalCodeResult, PostalError> {
        let normalized = normalize(address);

        let captures = address_pattern()
            .captures(&normalized)
            .ok_or_else(|| PostalError::MalformedAddress(normalized.clone()))?;
        let prefecture = &captures[1];
        let city = &captures[2];
        let rest = captures[3]
            .split_whitespace()
            .next()
            .ok_or_else(|| PostalError::MalformedAddress(normalized.clone()))?
            .to_string();

        // Town key is everything before the first digit or hyphen.
        let town_key: String = rest
            .chars()
            .take_while(|c| !c.is_ascii_digit() && *c != '-' && *c != 'ー' && *c != '－')
            .collect();

        let exact = self.entries.iter().find(|e| {
            e.prefecture == prefecture && e.city == city && e.town == town_key
        });

        let matched = exact.or_else(|| {
            self.entries.iter().find(|e| {
                e.prefecture == prefecture && e.city == city && e.town.contains(&town_key)
            })
        });

        match matched {
            Some(entry) => {
                let code = format!("{:0>7}", entry.code);
                Ok(PostalCodeResult::Found(format!(
                    "{}-{}",
                    &code[..3],
                    &code[3..]
                )))
            }
            None => Ok(PostalCodeResult::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, pref: &str, city: &str, town: &str) -> PostalCodeEntry {
        PostalCodeEntry {
            code: code.to_string(),
            prefecture: pref.to_string(),
            city: city.to_string(),
            town: town.to_string(),
            prefecture_kana: String::new(),
            city_kana: String::new(),
            town_kana: String::new(),
        }
    }

    fn sample_table() -> PostalTable {
        PostalTable::from_entries(vec![
            entry("1000005", "東京都", "千代田区", "丸の内"),
            entry("1000004", "東京都", "千代田区", "大手町"),
            entry("5300001", "大阪府", "大阪市北区", "梅田"),
        ])
    }

    #[test]
    fn exact_match_formats_code() {
        let table = sample_table();
        let result = table.lookup("東京都千代田区丸の内1-1-1").unwrap();
        assert_eq!(result, PostalCodeResult::Found("100-0005".to_string()));
    }

    #[test]
    fn full_width_input_matches() {
        let table = sample_table();
        let result = table.lookup("東京都千代田区丸の内１－１－１").unwrap();
        assert_eq!(result, PostalCodeResult::Found("100-0005".to_string()));
    }

    #[test]
    fn substring_fallback_first_row_wins() {
        let table = PostalTable::from_entries(vec![
            entry("1006890", "東京都", "千代田区", "丸の内オアゾ"),
            entry("1000005", "東京都", "千代田区", "丸の内（次のビルを除く）"),
        ]);
        // No exact 丸の内 row; both towns contain the key, first row in table
        // order wins.
        let result = table.lookup("東京都千代田区丸の内1-1").unwrap();
        assert_eq!(result, PostalCodeResult::Found("100-6890".to_string()));
    }

    #[test]
    fn unknown_address_is_not_found_not_error() {
        let table = sample_table();
        let result = table.lookup("架空県架空市架空町9-9").unwrap();
        assert_eq!(result, PostalCodeResult::NotFound);
        assert_eq!(result.as_csv_field(), NOT_FOUND_SENTINEL);
    }

    #[test]
    fn malformed_address_is_a_hard_error() {
        let table = sample_table();
        let err = table.lookup("丸の内1-1-1").unwrap_err();
        assert!(matches!(err, PostalError::MalformedAddress(_)));
    }

    #[test]
    fn code_is_zero_padded_to_seven_digits() {
        let table = PostalTable::from_entries(vec![entry(
            "600000", "北海道", "札幌市中央区", "大通西",
        )]);
        let result = table.lookup("北海道札幌市中央区大通西1-1").unwrap();
        assert_eq!(result, PostalCodeResult::Found("060-0000".to_string()));
    }

    #[test]
    fn loads_shift_jis_ken_all_rows() {
        let row = "01101,060,0600000,ﾎｯｶｲﾄﾞｳ,ｻｯﾎﾟﾛｼﾁｭｳｵｳｸ,ｵｵﾄﾞｵﾘﾆｼ,北海道,札幌市中央区,大通西,0,0,1,0,0,0\n";
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(row);
        let decoded = encoding_rs::SHIFT_JIS.decode(&encoded).0.into_owned();
        let table = PostalTable::from_reader(decoded.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        let result = table.lookup("北海道札幌市中央区大通西5-1").unwrap();
        assert_eq!(result, PostalCodeResult::Found("060-0000".to_string()));
    }
}
