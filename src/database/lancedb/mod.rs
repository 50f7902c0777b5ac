// LanceDB vector database module
// Handles vector storage and similarity search for embeddings


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::EmbeddingResult;

/// Vector record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier for this record
    pub id: String,
    /// The vector embedding
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the document the chunk came from
    pub source: String,
    /// The actual text content of the chunk
    pub content: String,
    /// Index of this chunk within its document
    pub chunk_index: u32,
    /// Timestamp when this record was created
    pub created_at: String,
}

impl VectorRecord {
    /// Build a record with a fresh id from an embedded chunk
    #[inline]
    pub fn from_embedding(result: EmbeddingResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metadata: ChunkMetadata {
                source: result.source.unwrap_or_default(),
                content: result.text,
                chunk_index: result
                    .chunk_index
                    .and_then(|index| u32::try_from(index).ok())
                    .unwrap_or_default(),
                created_at: Utc::now().to_rfc3339(),
            },
            vector: result.embedding,
        }
    }
}
