//! CLI commands implementation.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::extract::{ExtractionService, Extractor};
use crate::llm::LlmClient;
use crate::ocr::TesseractOcr;
use crate::postal::PostalTable;

#[derive(Parser)]
#[command(name = "toukiflow")]
#[command(about = "Real-estate inheritance registry acquisition pipeline")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a ledger PDF
    Run {
        /// Scanned registry ledger PDF
        ledger: PathBuf,

        /// Task identifier used to namespace output files (generated when
        /// omitted)
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Extract the registry office and inheritance addresses from a ledger
    Addresses {
        /// Scanned registry ledger PDF
        ledger: PathBuf,
    },

    /// Look up the postal code for a single address
    Zipcode {
        /// Address to resolve
        address: String,
    },
}

fn extraction_service(settings: &Settings) -> ExtractionService<TesseractOcr> {
    ExtractionService::new(TesseractOcr::new(), LlmClient::new(settings.llm.clone()))
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Run { ledger, task_id } => run_pipeline(&settings, &ledger, task_id).await,
        Commands::Addresses { ledger } => print_addresses(&settings, &ledger).await,
        Commands::Zipcode { address } => lookup_zipcode(&settings, &address),
    }
}

#[cfg(feature = "browser")]
async fn run_pipeline(
    settings: &Settings,
    ledger: &std::path::Path,
    task_id: Option<String>,
) -> anyhow::Result<()> {
    use std::sync::Arc;

    use uuid::Uuid;

    use crate::pipeline::Pipeline;
    use crate::portal::{CdpDriver, PortalSession};
    use crate::tasks::{JsonTaskStore, TaskTracker};

    let run_id = task_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let postal = Arc::new(
        PostalTable::load(&settings.ken_all_path)
            .with_context(|| format!("loading {}", settings.ken_all_path.display()))?,
    );
    let session = PortalSession::new(
        CdpDriver::new(settings.portal.clone()),
        settings.portal.clone(),
    );
    let mut pipeline = Pipeline::new(
        settings.clone(),
        extraction_service(settings),
        session,
        postal,
    );

    let tracker = JsonTaskStore::new(&settings.output_dir);
    tracker.create(&run_id).await?;
    tracker.mark_processing(&run_id).await?;

    match pipeline.run(ledger, &run_id).await {
        Ok(result) => {
            tracker
                .complete(&run_id, &serde_json::to_string(&result)?)
                .await?;
            println!("Run {} completed", result.run_id);
            println!("  certificates downloaded: {}", result.pdf_count);
            println!("  owner records extracted: {}", result.owner_count);
            println!("  final table: {}", result.output_files.final_output.display());
            Ok(())
        }
        Err(e) => {
            tracker.fail(&run_id, &e.to_string()).await?;
            Err(e.into())
        }
    }
}

#[cfg(not(feature = "browser"))]
async fn run_pipeline(
    _settings: &Settings,
    _ledger: &std::path::Path,
    _task_id: Option<String>,
) -> anyhow::Result<()> {
    anyhow::bail!("browser support not compiled; rebuild with: cargo build --features browser")
}

async fn print_addresses(settings: &Settings, ledger: &std::path::Path) -> anyhow::Result<()> {
    let service = extraction_service(settings);

    let office = service.registry_office(ledger).await?;
    println!("登記所名: {office}");

    let addresses = service.inheritance_addresses(ledger).await?;
    println!("住所一覧 ({}件):", addresses.len());
    for address in addresses {
        println!("  {address}");
    }
    Ok(())
}

fn lookup_zipcode(settings: &Settings, address: &str) -> anyhow::Result<()> {
    let table = PostalTable::load(&settings.ken_all_path)
        .with_context(|| format!("loading {}", settings.ken_all_path.display()))?;
    let result = table.lookup(address)?;
    println!("{}", result.as_csv_field());
    Ok(())
}
