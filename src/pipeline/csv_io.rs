//! Output table persistence.
//!
//! All tables are UTF-8 with a byte-order mark (the downstream spreadsheet
//! tooling expects it) and carry the original Japanese column headers.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use super::PipelineError;
use crate::models::OwnerRecord;

const BOM: &[u8] = b"\xef\xbb\xbf";

/// Owner-info table headers.
const OWNER_HEADERS: [&str; 4] = ["PDFファイル", "氏名", "所有者住所", "不動産所在地"];
/// Postal table headers.
const ZIPCODE_HEADERS: [&str; 2] = ["所有者住所", "郵便番号"];

fn bom_writer(path: &Path) -> Result<csv::Writer<File>, PipelineError> {
    let mut file = File::create(path)?;
    file.write_all(BOM)?;
    Ok(csv::Writer::from_writer(file))
}

/// Write the per-run owner-info table.
pub fn write_owner_info(path: &Path, records: &[OwnerRecord]) -> Result<(), PipelineError> {
    let mut writer = bom_writer(path)?;
    writer.write_record(OWNER_HEADERS)?;
    for record in records {
        writer.write_record([
            record.pdf_path.to_string_lossy().as_ref(),
            record.name.as_str(),
            record.owner_address.as_str(),
            record.property_address.as_str(),
        ])?;
    }
    writer.flush()?;
    info!("wrote {} owner rows to {}", records.len(), path.display());
    Ok(())
}

/// Write the per-run postal table: one row per distinct owner address.
pub fn write_zipcode_info(path: &Path, rows: &[(String, String)]) -> Result<(), PipelineError> {
    let mut writer = bom_writer(path)?;
    writer.write_record(ZIPCODE_HEADERS)?;
    for (address, code) in rows {
        writer.write_record([address.as_str(), code.as_str()])?;
    }
    writer.flush()?;
    info!("wrote {} postal rows to {}", rows.len(), path.display());
    Ok(())
}

/// Read a BOM-prefixed CSV into headers and rows.
fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), PipelineError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let content = if bytes.starts_with(BOM) {
        &bytes[BOM.len()..]
    } else {
        &bytes[..]
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(|f| f.to_string()).collect());
    }
    Ok((headers, rows))
}

/// Left-join the owner-info table against the postal table on owner address
/// and write the merged final table.
///
/// Every owner row appears exactly once in the output; rows whose address
/// has no postal match carry an empty postal code field. Returns the number
/// of merged rows.
pub fn merge_tables(
    owner_path: &Path,
    zipcode_path: &Path,
    output_path: &Path,
) -> Result<usize, PipelineError> {
    let (owner_headers, owner_rows) = read_table(owner_path)?;
    let (zip_headers, zip_rows) = read_table(zipcode_path)?;

    let join_column = ZIPCODE_HEADERS[0];
    let owner_key = owner_headers
        .iter()
        .position(|h| h == join_column)
        .ok_or_else(|| PipelineError::stage("merge", format!("owner table lacks {join_column}")))?;
    let zip_key = zip_headers
        .iter()
        .position(|h| h == join_column)
        .ok_or_else(|| PipelineError::stage("merge", format!("postal table lacks {join_column}")))?;

    let mut postal_by_address: HashMap<&str, Vec<&str>> = HashMap::new();
    for row in &zip_rows {
        // First row per address wins; the postal table is already distinct.
        postal_by_address
            .entry(row[zip_key].as_str())
            .or_insert_with(|| {
                row.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != zip_key)
                    .map(|(_, f)| f.as_str())
                    .collect()
            });
    }

    let extra_columns: Vec<&String> = zip_headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != zip_key)
        .map(|(_, h)| h)
        .collect();

    let mut writer = bom_writer(output_path)?;
    let mut merged_headers: Vec<&str> = owner_headers.iter().map(|h| h.as_str()).collect();
    merged_headers.extend(extra_columns.iter().map(|h| h.as_str()));
    writer.write_record(&merged_headers)?;

    for row in &owner_rows {
        let mut merged: Vec<&str> = row.iter().map(|f| f.as_str()).collect();
        match postal_by_address.get(row[owner_key].as_str()) {
            Some(extra) => merged.extend(extra.iter()),
            None => merged.extend(std::iter::repeat("").take(extra_columns.len())),
        }
        writer.write_record(&merged)?;
    }
    writer.flush()?;

    info!("merged {} rows into {}", owner_rows.len(), output_path.display());
    Ok(owner_rows.len())
}
