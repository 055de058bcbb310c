use serde::{Deserialize, Serialize};

/// An incoming document as handed over by the ingestion collaborator.
/// Immutable once ingested; removal cascades through the index and graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Collection membership label, e.g. "papers" or "notes".
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: text.into(),
        }
    }
}
