use index::SearchHit;
use ingest::Chunk;
use provider::{Cache, EmbeddingBackend, ProviderError, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One ranked retrieval candidate with its source attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub collection: String,
    /// Raw cosine similarity (priority-weighted when the collection carries
    /// a priority factor).
    pub similarity: f32,
    /// Min-max rescale of the weighted similarity over the merged candidate
    /// pool; a single-candidate or all-equal pool falls back to the raw
    /// cosine clamped to [0, 1].
    pub confidence: f32,
    pub rank: usize,
}

/// Candidates from one collection, tagged with its label and priority
/// factor (1.0 = neutral).
pub struct CollectionPool {
    pub collection: String,
    pub priority: f32,
    pub hits: Vec<SearchHit>,
}

/// Embeds queries once (cache-aware) and merges per-collection candidate
/// pools into a single ranked, attributed result list.
pub struct RetrievalCoordinator {
    embedder: EmbeddingBackend,
    cache: Arc<Cache>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl RetrievalCoordinator {
    pub fn new(
        embedder: EmbeddingBackend,
        cache: Arc<Cache>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            cache,
            retry,
            call_timeout,
        }
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, ProviderError> {
        if let Some(cached) = self.cache.get_embedding(query) {
            debug!("query embedding served from cache");
            return Ok(cached);
        }

        let vector = self
            .retry
            .retry("embed_query", || {
                self.embedder.embed(query, self.call_timeout)
            })
            .await?;

        self.cache.set_embedding(query, vector.clone());
        Ok(vector)
    }

    /// Merge, re-rank and truncate. Ordering is strictly descending by
    /// weighted similarity; ties break by lower chunk-insertion order, then
    /// collection label, which keeps results reproducible for a fixed index
    /// state.
    pub fn merge_and_rank(&self, pools: Vec<CollectionPool>, k: usize) -> Vec<RetrievalResult> {
        struct Candidate {
            chunk: Chunk,
            collection: String,
            weighted: f32,
            insertion: u64,
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for pool in pools {
            for hit in pool.hits {
                candidates.push(Candidate {
                    chunk: hit.chunk,
                    collection: pool.collection.clone(),
                    weighted: hit.similarity * pool.priority,
                    insertion: hit.insertion,
                });
            }
        }
        if candidates.is_empty() || k == 0 {
            return Vec::new();
        }

        candidates.sort_by(|a, b| {
            b.weighted
                .partial_cmp(&a.weighted)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.insertion.cmp(&b.insertion))
                .then(a.collection.cmp(&b.collection))
        });
        // Rescale bounds come from the full merged pool, not just the
        // surviving top-k.
        let min = candidates.iter().map(|c| c.weighted).fold(f32::INFINITY, f32::min);
        let max = candidates
            .iter()
            .map(|c| c.weighted)
            .fold(f32::NEG_INFINITY, f32::max);
        let spread = max - min;
        candidates.truncate(k);

        candidates
            .into_iter()
            .enumerate()
            .map(|(rank, c)| {
                let confidence = if spread > f32::EPSILON {
                    (c.weighted - min) / spread
                } else {
                    c.weighted.clamp(0.0, 1.0)
                };
                RetrievalResult {
                    chunk: c.chunk,
                    collection: c.collection,
                    similarity: c.weighted,
                    confidence,
                    rank,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider::HashedEmbedder;

    fn coordinator() -> RetrievalCoordinator {
        RetrievalCoordinator::new(
            EmbeddingBackend::Hashed(HashedEmbedder::new(32)),
            Arc::new(Cache::new(16)),
            RetryPolicy::none(),
            Duration::from_secs(1),
        )
    }

    fn hit(doc: &str, n: usize, similarity: f32, insertion: u64) -> SearchHit {
        SearchHit {
            chunk: Chunk::new(
                doc.to_string(),
                format!("text {n}"),
                "src".to_string(),
                (0, 6),
                n,
            ),
            similarity,
            insertion,
        }
    }

    #[test]
    fn merges_pools_and_attaches_labels() {
        let c = coordinator();
        let results = c.merge_and_rank(
            vec![
                CollectionPool {
                    collection: "A".into(),
                    priority: 1.0,
                    hits: vec![hit("a1", 0, 0.9, 0), hit("a1", 1, 0.4, 1)],
                },
                CollectionPool {
                    collection: "B".into(),
                    priority: 1.0,
                    hits: vec![hit("b1", 0, 0.7, 0)],
                },
            ],
            5,
        );

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].collection, "A");
        assert_eq!(results[1].collection, "B");
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert_eq!(results[0].rank, 0);
    }

    #[test]
    fn confidence_is_minmax_rescaled() {
        let c = coordinator();
        let results = c.merge_and_rank(
            vec![CollectionPool {
                collection: "A".into(),
                priority: 1.0,
                hits: vec![hit("a", 0, 0.9, 0), hit("a", 1, 0.5, 1), hit("a", 2, 0.1, 2)],
            }],
            5,
        );

        assert!((results[0].confidence - 1.0).abs() < 1e-6);
        assert!((results[1].confidence - 0.5).abs() < 1e-6);
        assert!((results[2].confidence - 0.0).abs() < 1e-6);
    }

    #[test]
    fn single_result_keeps_raw_cosine_as_confidence() {
        let c = coordinator();
        let results = c.merge_and_rank(
            vec![CollectionPool {
                collection: "A".into(),
                priority: 1.0,
                hits: vec![hit("a", 0, 0.83, 0)],
            }],
            5,
        );
        assert!((results[0].confidence - 0.83).abs() < 1e-6);
    }

    #[test]
    fn priority_factor_reweights_collections() {
        let c = coordinator();
        let results = c.merge_and_rank(
            vec![
                CollectionPool {
                    collection: "low".into(),
                    priority: 0.5,
                    hits: vec![hit("l", 0, 0.9, 0)],
                },
                CollectionPool {
                    collection: "high".into(),
                    priority: 1.0,
                    hits: vec![hit("h", 0, 0.6, 0)],
                },
            ],
            5,
        );
        assert_eq!(results[0].collection, "high");
    }

    #[test]
    fn truncates_to_k() {
        let c = coordinator();
        let hits = (0..10).map(|i| hit("a", i, 0.5, i as u64)).collect();
        let results = c.merge_and_rank(
            vec![CollectionPool {
                collection: "A".into(),
                priority: 1.0,
                hits,
            }],
            3,
        );
        assert_eq!(results.len(), 3);
        // Equal similarity: insertion order decides.
        assert_eq!(results[0].chunk.position, 0);
        assert_eq!(results[2].chunk.position, 2);
    }

    #[tokio::test]
    async fn query_embedding_is_cached_by_content() {
        let c = coordinator();
        let first = c.embed_query("machine learning").await.unwrap();
        let second = c.embed_query("machine learning").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(c.cache.stats().embeddings_cached, 1);
    }
}
