//! RagServe Ingestion Tool
//!
//! Maintains the search index the gateway queries:
//! 1. `create-index` creates (or updates) the index definition
//! 2. `clear-index` deletes the indexed documents
//! 3. `ingest [data_dir]` chunks, embeds and uploads PDF/MD/TXT files

mod chunker;
mod errors;
mod indexer;
mod pdf;

use errors::IngestionError;
use indexer::Indexer;
use ragserve_common::{
    config::{AppConfig, ObservabilityConfig},
    embeddings::create_embedder,
    search::AzureSearchClient,
    VERSION,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: ingestion <create-index|clear-index|ingest> [data_dir]";

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    CreateIndex,
    ClearIndex,
    Ingest { data_dir: Option<PathBuf> },
}

impl Command {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, IngestionError> {
        let mut args = args.into_iter();
        let command = args
            .next()
            .ok_or_else(|| IngestionError::Usage(USAGE.to_string()))?;

        let parsed = match command.as_str() {
            "create-index" => Command::CreateIndex,
            "clear-index" => Command::ClearIndex,
            "ingest" => Command::Ingest {
                data_dir: args.next().map(PathBuf::from),
            },
            other => {
                return Err(IngestionError::Usage(format!(
                    "unknown command '{}'\n{}",
                    other, USAGE
                )))
            }
        };

        if let Some(extra) = args.next() {
            return Err(IngestionError::Usage(format!(
                "unexpected argument '{}'\n{}",
                extra, USAGE
            )));
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let command = Command::parse(std::env::args().skip(1))?;

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("RagServe ingestion tool v{}", VERSION);

    let store = AzureSearchClient::from_config(&config.search)?;
    let embedder = create_embedder(&config.embedding)?;
    let indexer = Indexer::new(store, embedder, config.ingestion.clone());

    match command {
        Command::CreateIndex => indexer.create_index().await?,
        Command::ClearIndex => {
            indexer.clear_index().await?;
        }
        Command::Ingest { data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(&config.ingestion.data_dir));
            indexer.ingest(&data_dir).await?;
        }
    }

    Ok(())
}

/// Human-readable output unless JSON logging is configured
fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
