// Database module
// Persistent vector storage backed by LanceDB, one table per collection

pub mod lancedb;

pub use self::lancedb::{ChunkMetadata, VectorRecord, vector_store::{SearchResult, VectorStore}};
