//! Pipeline runner.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{csv_io, PipelineError};
use crate::config::Settings;
use crate::extract::Extractor;
use crate::models::{OutputFiles, OwnerRecord, PipelineResult};
use crate::portal::{CertificateFetcher, PortalError};
use crate::postal::{PostalError, PostalTable};
use crate::utils::{ensure_dir, CancelToken};

/// Run a stage body under the per-stage timeout, checking cancellation
/// first. A free function so stage bodies can borrow the pipeline mutably.
async fn run_stage<T, Fut>(
    name: &'static str,
    timeout: Duration,
    cancel: &CancelToken,
    fut: Fut,
) -> Result<T, PipelineError>
where
    Fut: Future<Output = Result<T, PipelineError>>,
{
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    info!("stage '{}' started", name);
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::StageTimeout { stage: name }),
    }
}

/// The extraction-and-automation pipeline.
///
/// Owns its collaborators for the duration of one run; nothing inside a run
/// is parallel. Concurrent runs use separate `Pipeline` values and
/// run-id-namespaced output directories.
pub struct Pipeline<E, F>
where
    E: Extractor,
    F: CertificateFetcher,
{
    settings: Settings,
    extractor: E,
    fetcher: F,
    postal: Arc<PostalTable>,
    cancel: CancelToken,
}

impl<E, F> Pipeline<E, F>
where
    E: Extractor,
    F: CertificateFetcher,
{
    pub fn new(settings: Settings, extractor: E, fetcher: F, postal: Arc<PostalTable>) -> Self {
        Self {
            settings,
            extractor,
            fetcher,
            postal,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the full pipeline for one ledger PDF.
    pub async fn run(
        &mut self,
        ledger_pdf: &Path,
        run_id: &str,
    ) -> Result<PipelineResult, PipelineError> {
        let run_dir = ensure_dir(&self.settings.run_dir(run_id))?;
        let timeout = self.settings.stage_timeout;

        let output_files = OutputFiles {
            owner_info: run_dir.join(format!("owner_info_{run_id}.csv")),
            zipcode_info: run_dir.join(format!("zipcode_info_{run_id}.csv")),
            final_output: run_dir.join(format!("final_output_{run_id}.csv")),
        };

        // Stage 1: inheritance addresses from the ledger.
        let extractor = &self.extractor;
        let raw_addresses = run_stage("extract_addresses", timeout, &self.cancel, async {
            extractor
                .inheritance_addresses(ledger_pdf)
                .await
                .map_err(|e| PipelineError::stage("extract_addresses", e))
        })
        .await?;

        // Stage 2: dedupe, sort, fetch certificates. Deterministic order
        // makes re-runs reproducible modulo portal state.
        let addresses: Vec<String> = raw_addresses
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!("{} distinct addresses to fetch", addresses.len());

        let fetcher = &mut self.fetcher;
        let certificates = run_stage("download_certificates", timeout, &self.cancel, async {
            fetcher
                .fetch_all(&addresses, &run_dir)
                .await
                .map_err(|e| match e {
                    PortalError::Cancelled => PipelineError::Cancelled,
                    other => PipelineError::stage("download_certificates", other),
                })
        })
        .await?;
        let pdf_count = certificates.len();
        info!("downloaded {} certificates", pdf_count);

        // Stage 3: owner info per certificate; incomplete extractions are
        // dropped, not surfaced.
        let extractor = &self.extractor;
        let records = run_stage("extract_owner_info", timeout, &self.cancel, async {
            let mut records: Vec<OwnerRecord> = Vec::with_capacity(certificates.len());
            for certificate in &certificates {
                let info = extractor
                    .owner_info(&certificate.path)
                    .await
                    .map_err(|e| PipelineError::stage("extract_owner_info", e))?;
                if let Some(info) = info {
                    records.push(OwnerRecord::new(certificate.path.clone(), info));
                }
            }
            Ok(records)
        })
        .await?;
        csv_io::write_owner_info(&output_files.owner_info, &records)?;

        // Stage 4: postal codes for distinct owner addresses, first-seen
        // order. A malformed address aborts that record's enrichment only.
        let postal = self.postal.clone();
        let zip_rows = run_stage("resolve_postal_codes", timeout, &self.cancel, async {
            let mut seen = BTreeSet::new();
            let mut rows: Vec<(String, String)> = Vec::new();
            for record in &records {
                if !seen.insert(record.owner_address.clone()) {
                    continue;
                }
                match postal.lookup(&record.owner_address) {
                    Ok(result) => {
                        rows.push((record.owner_address.clone(), result.as_csv_field().to_string()))
                    }
                    Err(PostalError::MalformedAddress(addr)) => {
                        warn!("malformed owner address, skipping enrichment: {}", addr);
                    }
                    Err(e) => return Err(PipelineError::stage("resolve_postal_codes", e)),
                }
            }
            Ok(rows)
        })
        .await?;
        csv_io::write_zipcode_info(&output_files.zipcode_info, &zip_rows)?;

        // Stage 5: left-join merge into the final table.
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        csv_io::merge_tables(
            &output_files.owner_info,
            &output_files.zipcode_info,
            &output_files.final_output,
        )?;

        let result = PipelineResult {
            run_id: run_id.to_string(),
            pdf_count,
            owner_count: records.len(),
            output_files,
        };
        info!(
            "run {} complete: {} PDFs, {} owner records",
            result.run_id, result.pdf_count, result.owner_count
        );
        Ok(result)
    }

    /// Run directory for a given run id (exposed for callers that persist
    /// auxiliary files next to the tables).
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.settings.run_dir(run_id)
    }
}
