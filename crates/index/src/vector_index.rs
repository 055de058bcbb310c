use ingest::Chunk;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index is degraded ({0}); writes are rejected, stale reads still served")]
    Degraded(String),
    #[error("vector dimension mismatch: index holds {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
    Updating,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
    /// Monotonic insertion counter, the deterministic tie-break for
    /// equal-similarity results.
    insertion: u64,
}

/// One search candidate. `similarity` is the raw cosine value; confidence
/// rescaling happens in the retrieval coordinator where the full candidate
/// pool is known.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub similarity: f32,
    pub insertion: u64,
}

/// Serializable image of an index for the snapshot format.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimension: usize,
    chunks: Vec<StoredChunk>,
    next_insertion: u64,
}

/// In-memory nearest-neighbor store over chunk vectors. One per collection;
/// the embedding dimension is fixed at construction.
///
/// States: Empty -> Building -> Ready -> Updating -> Ready. A failed
/// embedding pass marks the index Degraded: reads keep serving the last
/// Ready-state contents, the next mutation attempt gets `IndexError::Degraded`.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    state: IndexState,
    degraded_reason: Option<String>,
    chunks: Vec<StoredChunk>,
    next_insertion: u64,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: IndexState::Empty,
            degraded_reason: None,
            chunks: Vec::new(),
            next_insertion: 0,
        }
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains_doc(&self, doc_id: &str) -> bool {
        self.chunks.iter().any(|s| s.chunk.doc_id == doc_id)
    }

    /// Chunk ids currently stored for one document, in insertion order.
    pub fn doc_chunk_ids(&self, doc_id: &str) -> Vec<String> {
        self.chunks
            .iter()
            .filter(|s| s.chunk.doc_id == doc_id)
            .map(|s| s.chunk.chunk_id.clone())
            .collect()
    }

    pub fn doc_count(&self) -> usize {
        let mut ids: Vec<&str> = self.chunks.iter().map(|s| s.chunk.doc_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    fn check_writable(&self) -> Result<(), IndexError> {
        if self.state == IndexState::Degraded {
            return Err(IndexError::Degraded(
                self.degraded_reason.clone().unwrap_or_default(),
            ));
        }
        Ok(())
    }

    /// Publish a fully-embedded document atomically. All vectors are
    /// validated before anything becomes visible, so a document is either
    /// completely indexed or not at all. Re-inserting a document id replaces
    /// its prior chunks.
    pub fn insert_document(
        &mut self,
        doc_id: &str,
        embedded: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<(), IndexError> {
        self.check_writable()?;

        for (_, vector) in &embedded {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                });
            }
        }

        self.state = if self.state == IndexState::Empty {
            IndexState::Building
        } else {
            IndexState::Updating
        };

        self.chunks.retain(|s| s.chunk.doc_id != doc_id);
        for (chunk, vector) in embedded {
            self.chunks.push(StoredChunk {
                chunk,
                vector,
                insertion: self.next_insertion,
            });
            self.next_insertion += 1;
        }

        self.state = IndexState::Ready;
        debug!(doc_id, total_chunks = self.chunks.len(), "document published to index");
        Ok(())
    }

    /// Purge a document's chunks. Returns the removed chunk ids so the
    /// caller can cascade evidence cleanup into the graph store.
    pub fn remove_document(&mut self, doc_id: &str) -> Result<Vec<String>, IndexError> {
        self.check_writable()?;

        let removed: Vec<String> = self
            .chunks
            .iter()
            .filter(|s| s.chunk.doc_id == doc_id)
            .map(|s| s.chunk.chunk_id.clone())
            .collect();
        self.chunks.retain(|s| s.chunk.doc_id != doc_id);

        if self.chunks.is_empty() {
            self.state = IndexState::Empty;
        }
        Ok(removed)
    }

    /// Record a failed build pass. Reads continue against the last Ready
    /// contents; writes are rejected until the index is rebuilt or reloaded.
    pub fn mark_degraded(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "vector index degraded");
        self.degraded_reason = Some(reason);
        self.state = IndexState::Degraded;
    }

    /// Top-k by descending cosine similarity. Ties are broken by lower
    /// insertion order. An Empty index yields an empty Vec, not an error;
    /// a Degraded index serves its stale contents.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.chunks.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .chunks
            .iter()
            .map(|s| SearchHit {
                chunk: s.chunk.clone(),
                similarity: cosine_similarity(query, &s.vector),
                insertion: s.insertion,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.insertion.cmp(&b.insertion))
        });
        hits.truncate(k);
        hits
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            dimension: self.dimension,
            chunks: self.chunks.clone(),
            next_insertion: self.next_insertion,
        }
    }

    pub fn restore(snapshot: IndexSnapshot) -> Self {
        let state = if snapshot.chunks.is_empty() {
            IndexState::Empty
        } else {
            IndexState::Ready
        };
        Self {
            dimension: snapshot.dimension,
            state,
            degraded_reason: None,
            chunks: snapshot.chunks,
            next_insertion: snapshot.next_insertion,
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, n: usize) -> Chunk {
        Chunk::new(
            doc.to_string(),
            format!("chunk {n} of {doc}"),
            "test".to_string(),
            (n * 10, n * 10 + 10),
            n,
        )
    }

    #[test]
    fn search_on_empty_index_returns_nothing() {
        let index = VectorIndex::new(3);
        assert_eq!(index.state(), IndexState::Empty);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn ranks_by_descending_similarity() {
        let mut index = VectorIndex::new(2);
        index
            .insert_document(
                "d1",
                vec![
                    (chunk("d1", 0), vec![1.0, 0.0]),
                    (chunk("d1", 1), vec![0.0, 1.0]),
                    (chunk("d1", 2), vec![0.7, 0.7]),
                ],
            )
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert_eq!(hits[0].chunk.position, 0);
        for pair in hits.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn equal_similarity_ties_break_by_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .insert_document(
                "d1",
                vec![
                    (chunk("d1", 0), vec![0.5, 0.5]),
                    (chunk("d1", 1), vec![0.5, 0.5]),
                ],
            )
            .unwrap();

        let hits = index.search(&[1.0, 1.0], 2);
        assert_eq!(hits[0].chunk.position, 0);
        assert_eq!(hits[1].chunk.position, 1);
    }

    #[test]
    fn reinserting_a_document_does_not_duplicate() {
        let mut index = VectorIndex::new(2);
        let batch = vec![(chunk("d1", 0), vec![1.0, 0.0])];
        index.insert_document("d1", batch.clone()).unwrap();
        index.insert_document("d1", batch).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn dimension_mismatch_publishes_nothing() {
        let mut index = VectorIndex::new(2);
        let err = index
            .insert_document(
                "d1",
                vec![
                    (chunk("d1", 0), vec![1.0, 0.0]),
                    (chunk("d1", 1), vec![1.0, 0.0, 0.0]),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
        assert!(index.is_empty());
        assert_eq!(index.state(), IndexState::Empty);
    }

    #[test]
    fn degraded_index_rejects_writes_but_serves_reads() {
        let mut index = VectorIndex::new(2);
        index
            .insert_document("d1", vec![(chunk("d1", 0), vec![1.0, 0.0])])
            .unwrap();
        index.mark_degraded("embedding provider unreachable");

        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
        let err = index
            .insert_document("d2", vec![(chunk("d2", 0), vec![0.0, 1.0])])
            .unwrap_err();
        assert!(matches!(err, IndexError::Degraded(_)));
        let err = index.remove_document("d1").unwrap_err();
        assert!(matches!(err, IndexError::Degraded(_)));
    }

    #[test]
    fn removal_returns_chunk_ids_and_may_empty_the_index() {
        let mut index = VectorIndex::new(2);
        index
            .insert_document("d1", vec![(chunk("d1", 0), vec![1.0, 0.0])])
            .unwrap();
        let removed = index.remove_document("d1").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(index.state(), IndexState::Empty);
    }

    #[test]
    fn snapshot_round_trip_preserves_ranking() {
        let mut index = VectorIndex::new(2);
        index
            .insert_document(
                "d1",
                vec![
                    (chunk("d1", 0), vec![0.5, 0.5]),
                    (chunk("d1", 1), vec![0.5, 0.5]),
                ],
            )
            .unwrap();

        let restored = VectorIndex::restore(index.snapshot());
        assert_eq!(restored.state(), IndexState::Ready);
        let hits = restored.search(&[1.0, 1.0], 2);
        assert_eq!(hits[0].chunk.position, 0);
    }
}
