#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Document;

/// Represents a chunk of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The chunk text
    pub content: String,
    /// Source identifier of the document this chunk was cut from
    pub source: String,
    /// The index of this chunk within its document
    pub chunk_index: usize,
    /// Offset of the first character of this chunk within the document, in chars
    pub char_offset: usize,
}

/// Configuration for content chunking. Sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// Distance between the starts of consecutive windows
    #[inline]
    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }
}

/// Split `text` with a fixed-size sliding window.
///
/// Every window holds at most `chunk_size` characters and starts
/// `chunk_size - chunk_overlap` characters after the previous one, so
/// consecutive windows share exactly `chunk_overlap` characters. The last
/// window ends at the end of the text and may be shorter. Text that fits in
/// one window comes back as a single chunk, and empty text yields nothing.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let size = config.chunk_size.max(1);
    let stride = config.stride();

    let mut windows = Vec::new();
    if chars.is_empty() {
        return windows;
    }

    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        windows.push((start, window));

        if end == chars.len() {
            break;
        }
        start += stride;
    }

    windows
}

/// Chunk a loaded document into embedding-ready pieces
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<ContentChunk> {
    if document.content.trim().is_empty() {
        debug!("Skipping empty document {}", document.source);
        return Vec::new();
    }

    let chunks: Vec<ContentChunk> = split_text(&document.content, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (char_offset, content))| ContentChunk {
            content,
            source: document.source.clone(),
            chunk_index,
            char_offset,
        })
        .collect();

    debug!(
        "Chunked '{}' into {} chunks ({} chars, size {}, overlap {})",
        document.source,
        chunks.len(),
        document.content.chars().count(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Chunk every document, keeping document order
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<ContentChunk> {
    documents
        .iter()
        .flat_map(|document| chunk_document(document, config))
        .collect()
}
