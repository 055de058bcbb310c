use serde::{Deserialize, Serialize};

/// An entity mention as returned by the extraction capability, before
/// canonicalization in the graph store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityCandidate {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// A labeled relation between two same-sentence entity candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationCandidate {
    pub source: EntityCandidate,
    pub target: EntityCandidate,
    pub label: String,
}

/// Everything extracted from one chunk, keyed by its evidence chunk id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub chunk_id: String,
    pub doc_id: String,
    pub entities: Vec<EntityCandidate>,
    pub relations: Vec<RelationCandidate>,
}

/// Aggregate outcome of one build pass. Sentence-local failures are
/// counted here instead of aborting the pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub chunks_processed: usize,
    pub sentences_processed: usize,
    pub sentences_skipped: usize,
    pub entities_found: usize,
    pub relations_found: usize,
    pub errors: Vec<String>,
}

impl ExtractionReport {
    pub fn merge(&mut self, other: ExtractionReport) {
        self.chunks_processed += other.chunks_processed;
        self.sentences_processed += other.sentences_processed;
        self.sentences_skipped += other.sentences_skipped;
        self.entities_found += other.entities_found;
        self.relations_found += other.relations_found;
        self.errors.extend(other.errors);
    }
}
