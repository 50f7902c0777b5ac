
use std::io::Write;

use tracing::{debug, info};

use crate::config::Config;
use crate::database::{VectorRecord, VectorStore};
use crate::documents::load_documents;
use crate::embeddings::{ChunkingConfig, OllamaClient, chunk_documents};
use crate::{RagError, Result};

/// Printed before an existing store is deleted
pub const WIPE_NOTICE: &str = "Deleting db...";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Delete and recreate the store before indexing
    pub wipe: bool,
}

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Records in the collection after the run
    pub total_records: u64,
    pub wiped: bool,
}

/// Turns a directory of text files into a populated collection
pub struct Ingestor<'a> {
    config: &'a Config,
    embedder: OllamaClient,
    chunking: ChunkingConfig,
}

impl<'a> Ingestor<'a> {
    #[inline]
    pub fn new(config: &'a Config) -> Result<Self> {
        let embedder = OllamaClient::new(config)
            .map_err(|e| RagError::Embedding(format!("Failed to create embedding client: {:#}", e)))?;

        Ok(Self::with_embedder(config, embedder))
    }

    #[inline]
    pub fn with_embedder(config: &'a Config, embedder: OllamaClient) -> Self {
        Self {
            config,
            embedder,
            chunking: config.chunking.clone(),
        }
    }

    /// Run the pipeline, writing user-facing progress lines to `out`
    #[inline]
    pub async fn run<W>(&self, options: IngestOptions, out: &mut W) -> Result<IngestReport>
    where
        W: Write + Send,
    {
        let mut report = IngestReport::default();

        if options.wipe {
            let store_path = self.config.vector_database_path();
            if store_path.exists() {
                writeln!(out, "{}", WIPE_NOTICE)?;
            }
            report.wiped = VectorStore::wipe(&store_path)?;
        }

        let source_dir = self.config.source_directory_path();
        let documents = load_documents(&source_dir)?;
        report.documents = documents.len();

        let chunks = chunk_documents(&documents, &self.chunking);
        report.chunks = chunks.len();
        debug!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let embeddings = self
            .embedder
            .generate_chunk_embeddings(&chunks)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let records: Vec<VectorRecord> = embeddings
            .into_iter()
            .map(VectorRecord::from_embedding)
            .collect();

        let mut store = VectorStore::new(self.config).await?;
        store.add_records(records).await?;
        report.total_records = store.count().await?;

        info!(
            "Ingested {} chunks from {} documents into '{}'",
            report.chunks,
            report.documents,
            store.collection()
        );
        writeln!(
            out,
            "Indexed {} chunks from {} documents into collection '{}'",
            report.chunks,
            report.documents,
            store.collection()
        )?;

        Ok(report)
    }
}
