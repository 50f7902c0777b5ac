
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// File extension considered during discovery
pub const DOCUMENT_EXTENSION: &str = "txt";

/// A loaded plain-text document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw text content
    pub content: String,
    /// Source identifier, the path the document was read from
    pub source: String,
}

/// Recursively find `.txt` files under `dir`, sorted by path
#[inline]
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Source directory not found: {}", dir.display()),
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some(DOCUMENT_EXTENSION)
        {
            paths.push(entry.into_path());
        }
    }

    debug!("Discovered {} documents under {}", paths.len(), dir.display());
    Ok(paths)
}

/// Read one document as UTF-8 text
#[inline]
pub fn load_document(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path).map_err(|e| {
        RagError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })?;

    Ok(Document {
        content,
        source: path.display().to_string(),
    })
}

/// Load every `.txt` document under `dir`
///
/// Fails with [`RagError::NoDocuments`] when nothing matches.
#[inline]
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let paths = discover_documents(dir)?;
    if paths.is_empty() {
        return Err(RagError::NoDocuments(dir.display().to_string()));
    }

    let documents = paths
        .iter()
        .map(|path| load_document(path))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}
