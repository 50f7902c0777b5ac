// Embeddings module
// Sliding-window chunking and the Ollama-compatible embedding client

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, ContentChunk, chunk_document, chunk_documents, split_text};
pub use ollama::{EmbeddingResult, OllamaClient};
