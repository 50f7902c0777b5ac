use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, show_config};
use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::ingest::{IngestOptions, Ingestor};
use crate::llm::ModelType;
use crate::qa::QaSession;

/// Resolve the effective configuration: defaults, then the config file (the
/// given path or the discovered one), then environment overrides
#[inline]
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(Config::discover_config_file);

    if let Some(config_path) = &config_path {
        info!("Using config file {}", config_path.display());
    }

    Config::load(config_path.as_deref())?
        .with_process_env()
        .context("Invalid configuration in environment")
}

/// Index every document in the source directory
#[inline]
pub async fn ingest(config: &Config, wipe: bool) -> Result<()> {
    let ingestor = Ingestor::new(config).context("Failed to initialize ingestion")?;
    let report = ingestor
        .run(IngestOptions { wipe }, &mut io::stdout())
        .await
        .context("Ingestion failed")?;

    info!(
        "Collection '{}' now holds {} records",
        config.store.collection, report.total_records
    );
    Ok(())
}

/// Answer questions from stdin until `exit`
#[inline]
pub async fn query(config: &Config) -> Result<()> {
    let session = QaSession::from_config(config)
        .await
        .context("Failed to start query session")?;

    session
        .run(BufReader::new(io::stdin()), io::stdout())
        .await
        .context("Query session failed")?;

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_configuration(config: &Config) {
    show_config(config);
}

/// Show the state of the store and the model runtimes
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Local RAG Status Report").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding Runtime:");
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Connected ({})", config.embeddings_url()?);
                println!("   📋 Model: {}", client.model());
            }
            Err(e) => {
                println!("   ⚠️  Unhealthy - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Failed to connect - {:#}", e);
        }
    }

    println!("🧠 Language Model:");
    match config.model.model_type.parse::<ModelType>() {
        Ok(model_type) => {
            println!("   ✅ {} ({})", model_type, config.model.model_path);
        }
        Err(_) => {
            warn!("Unsupported model type: {}", config.model.model_type);
            println!(
                "   ❌ Unsupported model type '{}'",
                config.model.model_type
            );
        }
    }

    println!("🔍 Vector Store:");
    let store = match VectorStore::new(config).await {
        Ok(store) => store,
        Err(e) => {
            println!("   ❌ Failed to open - {}", e);
            return Ok(());
        }
    };

    let count = store.count().await.context("Failed to count records")?;
    println!(
        "   📁 {} (collection '{}')",
        store.path().display(),
        store.collection()
    );
    println!("   🔢 Records: {}", count);
    if let Some(dimension) = store.vector_dimension() {
        println!("   📐 Vector Dimension: {}", dimension);
    }

    let sources = store.sources().await.context("Failed to list sources")?;
    if sources.is_empty() {
        println!();
        println!("No documents have been ingested yet.");
        println!("Use 'local-rag ingest' to index the source directory.");
    } else {
        println!();
        println!("Sources ({} total):", sources.len());
        for source in sources {
            println!("   📄 {}", source);
        }
    }

    Ok(())
}
