pub mod chunk;
pub mod chunker;
pub mod document;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use document::Document;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document {0} has no extractable text")]
    EmptyDocument(String),
    #[error("invalid chunker config: size {size} must be greater than overlap {overlap}")]
    Config { size: usize, overlap: usize },
}

/// Chunk a single incoming document. The ingestion collaborator hands us
/// `{document_id, source_label, text}`; everything upstream of that (file
/// parsing, cleanup) happens outside the core.
pub fn chunk_document(doc: &Document, config: &ChunkerConfig) -> Result<Vec<Chunk>, IngestError> {
    if doc.text.trim().is_empty() {
        return Err(IngestError::EmptyDocument(doc.id.clone()));
    }

    let chunker = Chunker::new(config.clone())?;
    Ok(chunker.chunk_text(&doc.id, &doc.text, &doc.source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_document() {
        let doc = Document::new("d1", "papers", "   \n  ");
        let err = chunk_document(&doc, &ChunkerConfig::default()).unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument(_)));
    }

    #[test]
    fn chunks_simple_document() {
        let doc = Document::new("d1", "papers", "hello world, this is a document");
        let chunks = chunk_document(&doc, &ChunkerConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].doc_id, "d1");
        assert_eq!(chunks[0].source, "papers");
    }
}
