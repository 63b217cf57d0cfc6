//! End-to-end pipeline runs against fake collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use toukiflow::config::Settings;
use toukiflow::extract::{ExtractError, Extractor};
use toukiflow::models::{DownloadedCertificate, OwnerInfo, PostalCodeEntry};
use toukiflow::pipeline::Pipeline;
use toukiflow::portal::{CertificateFetcher, PortalError};
use toukiflow::postal::PostalTable;
use toukiflow::utils::certificate_filename;

struct FakeExtractor {
    /// Raw address lines as the extraction service would return them,
    /// duplicates preserved.
    addresses: Vec<String>,
    /// Owner facts keyed by certificate address; `None` models an
    /// incomplete extraction.
    owners: HashMap<String, Option<OwnerInfo>>,
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn registry_office(&self, _pdf_path: &Path) -> Result<String, ExtractError> {
        Ok("大阪法務局".to_string())
    }

    async fn inheritance_addresses(&self, _pdf_path: &Path) -> Result<Vec<String>, ExtractError> {
        Ok(self.addresses.clone())
    }

    async fn owner_info(&self, pdf_path: &Path) -> Result<Option<OwnerInfo>, ExtractError> {
        let stem = pdf_path.file_stem().unwrap().to_str().unwrap();
        for (address, info) in &self.owners {
            if certificate_filename(address).starts_with(stem) {
                return Ok(info.clone());
            }
        }
        Ok(None)
    }
}

/// Fetcher that saves a dummy certificate for every address.
struct FakeFetcher;

#[async_trait]
impl CertificateFetcher for FakeFetcher {
    async fn fetch_all(
        &mut self,
        addresses: &[String],
        out_dir: &Path,
    ) -> Result<Vec<DownloadedCertificate>, PortalError> {
        let mut certificates = Vec::new();
        for address in addresses {
            let path = out_dir.join(certificate_filename(address));
            std::fs::write(&path, b"%PDF-1.4 fake").unwrap();
            certificates.push(DownloadedCertificate {
                address: address.clone(),
                path,
                fetched_at: Utc::now(),
            });
        }
        Ok(certificates)
    }
}

fn owner(name: &str, owner_address: &str, property: &str) -> Option<OwnerInfo> {
    Some(OwnerInfo {
        name: name.to_string(),
        owner_address: owner_address.to_string(),
        property_address: property.to_string(),
    })
}

fn postal_table() -> Arc<PostalTable> {
    Arc::new(PostalTable::from_entries(vec![PostalCodeEntry {
        code: "1000005".to_string(),
        prefecture: "東京都".to_string(),
        city: "千代田区".to_string(),
        town: "丸の内".to_string(),
        prefecture_kana: String::new(),
        city_kana: String::new(),
        town_kana: String::new(),
    }]))
}

fn pipeline_under_test(output_dir: &Path) -> Pipeline<FakeExtractor, FakeFetcher> {
    let settings = Settings {
        output_dir: output_dir.to_path_buf(),
        ..Settings::default()
    };

    let mut owners = HashMap::new();
    owners.insert(
        "東近江市佐野町801".to_string(),
        owner("山田 太郎", "東京都千代田区丸の内1-1", "滋賀県東近江市佐野町801"),
    );
    owners.insert(
        "京都市中京区1-1".to_string(),
        owner("佐藤 花子", "架空県架空市架空町9-9", "京都府京都市中京区1-1"),
    );
    // Third certificate yields an incomplete extraction and is dropped.
    owners.insert("大阪市北区梅田1-1".to_string(), None);

    let extractor = FakeExtractor {
        // Raw list has a duplicate; the pipeline dedupes before fetching.
        addresses: vec![
            "東近江市佐野町801".to_string(),
            "京都市中京区1-1".to_string(),
            "大阪市北区梅田1-1".to_string(),
            "東近江市佐野町801".to_string(),
        ],
        owners,
    };

    Pipeline::new(settings, extractor, FakeFetcher, postal_table())
}

fn read_lines(path: &Path) -> Vec<String> {
    let bytes = std::fs::read(path).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(|l| l.to_string())
        .collect()
}

#[tokio::test]
async fn full_run_produces_all_three_tables() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.pdf");
    std::fs::write(&ledger, b"%PDF-1.4 ledger").unwrap();

    let mut pipeline = pipeline_under_test(dir.path());
    let result = pipeline.run(&ledger, "run-a").await.unwrap();

    assert_eq!(result.run_id, "run-a");
    assert_eq!(result.pdf_count, 3);
    assert_eq!(result.owner_count, 2);
    assert!(result.owner_count <= result.pdf_count);

    assert!(result.output_files.owner_info.exists());
    assert!(result.output_files.zipcode_info.exists());
    assert!(result.output_files.final_output.exists());

    // Owner table: header plus one row per complete extraction.
    let owner_lines = read_lines(&result.output_files.owner_info);
    assert_eq!(owner_lines.len(), 3);

    // Postal table: one row per distinct owner address.
    let zip_lines = read_lines(&result.output_files.zipcode_info);
    assert_eq!(zip_lines[0], "所有者住所,郵便番号");
    assert_eq!(zip_lines.len(), 3);
    assert!(zip_lines.iter().any(|l| l.ends_with("100-0005")));
    assert!(zip_lines.iter().any(|l| l.ends_with("該当なし")));

    // Final table is a left join: every owner row survives.
    let final_lines = read_lines(&result.output_files.final_output);
    assert_eq!(final_lines.len(), owner_lines.len());
    assert!(final_lines[0].ends_with("郵便番号"));
}

#[tokio::test]
async fn concurrent_runs_use_disjoint_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.pdf");
    std::fs::write(&ledger, b"%PDF-1.4 ledger").unwrap();

    let result_a = pipeline_under_test(dir.path())
        .run(&ledger, "run-a")
        .await
        .unwrap();
    let result_b = pipeline_under_test(dir.path())
        .run(&ledger, "run-b")
        .await
        .unwrap();

    let files_a = [
        &result_a.output_files.owner_info,
        &result_a.output_files.zipcode_info,
        &result_a.output_files.final_output,
    ];
    let files_b = [
        &result_b.output_files.owner_info,
        &result_b.output_files.zipcode_info,
        &result_b.output_files.final_output,
    ];

    for a in &files_a {
        assert!(a.exists());
        assert!(!files_b.contains(a));
    }
    for b in &files_b {
        assert!(b.exists());
    }

    // Same ledger, same counts: runs are reproducible in structure.
    assert_eq!(result_a.pdf_count, result_b.pdf_count);
    assert_eq!(result_a.owner_count, result_b.owner_count);
}

#[tokio::test]
async fn certificates_land_in_the_run_directory() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.pdf");
    std::fs::write(&ledger, b"%PDF-1.4 ledger").unwrap();

    let mut pipeline = pipeline_under_test(dir.path());
    pipeline.run(&ledger, "run-c").await.unwrap();

    let run_dir = dir.path().join("run-c");
    let pdfs: Vec<PathBuf> = std::fs::read_dir(&run_dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "pdf").unwrap_or(false))
        .collect();
    assert_eq!(pdfs.len(), 3);
}
