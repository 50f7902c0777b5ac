// Retrieval module
// Embeds queries and selects context chunks from the vector store

pub mod mmr;


use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::database::{SearchResult, VectorStore};
use crate::embeddings::OllamaClient;
use crate::{RagError, Result};

pub use mmr::{cosine_similarity, maximal_marginal_relevance};

/// How candidates are chosen from the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Maximal marginal relevance over `fetch_k` nearest candidates
    #[default]
    Mmr,
    /// Plain nearest-neighbour search
    Similarity,
}

impl fmt::Display for SearchType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mmr => f.write_str("mmr"),
            Self::Similarity => f.write_str("similarity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_type: SearchType,
    /// Number of chunks handed to the model
    pub k: usize,
    /// Number of nearest candidates considered by MMR
    pub fetch_k: usize,
    /// 1.0 favours relevance only, 0.0 diversity only
    pub lambda_mult: f32,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            search_type: SearchType::Mmr,
            k: 4,
            fetch_k: 20,
            lambda_mult: 0.5,
        }
    }
}

/// Query-side view of the store: embed, search, select
pub struct Retriever {
    store: VectorStore,
    embedder: OllamaClient,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(store: VectorStore, embedder: OllamaClient, config: RetrievalConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed `query` and return the chunks to use as answer context
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query_vector = self
            .embedder
            .embed_query(query)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        self.retrieve_by_vector(&query_vector).await
    }

    /// Select context chunks for an already embedded query
    #[inline]
    pub async fn retrieve_by_vector(&self, query_vector: &[f32]) -> Result<Vec<SearchResult>> {
        let selected = self.select(query_vector).await?;
        for result in &selected {
            debug!(
                "Context chunk {}#{} (similarity {:.3})",
                result.chunk_metadata.source,
                result.chunk_metadata.chunk_index,
                result.similarity_score
            );
        }
        Ok(selected)
    }

    async fn select(&self, query_vector: &[f32]) -> Result<Vec<SearchResult>> {
        match self.config.search_type {
            SearchType::Similarity => {
                let results = self.store.search(query_vector, self.config.k).await?;
                debug!("Similarity search returned {} chunks", results.len());
                Ok(results)
            }
            SearchType::Mmr => {
                let fetch_k = self.config.fetch_k.max(self.config.k);
                let candidates = self.store.search(query_vector, fetch_k).await?;

                let vectors: Vec<&[f32]> =
                    candidates.iter().map(|c| c.vector.as_slice()).collect();
                let picked = maximal_marginal_relevance(
                    query_vector,
                    &vectors,
                    self.config.k,
                    self.config.lambda_mult,
                );

                info!(
                    "MMR selected {} of {} candidates",
                    picked.len(),
                    candidates.len()
                );

                let mut slots: Vec<Option<SearchResult>> =
                    candidates.into_iter().map(Some).collect();
                Ok(picked
                    .into_iter()
                    .filter_map(|index| slots[index].take())
                    .collect())
            }
        }
    }
}
