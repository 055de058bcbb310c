pub mod cancel;
pub mod collection;
pub mod config;
pub mod snapshot;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use snapshot::{CollectionSnapshot, EngineSnapshot, SnapshotError};

use collection::Collection;
use extract::{ExtractionReport, Extractor, ExtractionBackend};
use graph::{GraphExport, GraphStore, PathEdge, entity_id, shortest_path};
use index::{IndexError, IndexState, VectorIndex};
use ingest::{Chunk, Document, IngestError, chunk_document};
use provider::{Cache, CacheStats, EmbeddingBackend, GenerationBackend, ProviderError, RetryPolicy};
use query::{
    ABSTAIN_TEXT, Answer, AnswerSynthesizer, CollectionPool, RetrievalCoordinator, RetrievalResult,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("ingestion cancelled, nothing was published")]
    Cancelled,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Outcome of one successful document ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub collection: String,
    pub chunks_indexed: usize,
    pub report: ExtractionReport,
}

#[derive(Debug, Serialize)]
pub struct EngineStats {
    pub collections: Vec<CollectionStats>,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub documents: usize,
    pub chunks: usize,
    pub state: IndexState,
    pub entities: usize,
    pub edges: usize,
}

/// The explicit context object owning all per-collection state. Backends
/// are resolved once at construction; every provider call downstream goes
/// through the timeout and retry policy configured here.
pub struct Engine {
    config: EngineConfig,
    dimension: usize,
    embedder: EmbeddingBackend,
    extractor: Extractor,
    coordinator: RetrievalCoordinator,
    synthesizer: AnswerSynthesizer,
    cache: Arc<Cache>,
    retry: RetryPolicy,
    call_timeout: Duration,
    embed_permits: Arc<Semaphore>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

enum EmbedFailure {
    Cancelled,
    Provider(ProviderError),
}

impl Engine {
    /// Probes the embedding backend for its dimension, then wires the
    /// retrieval and synthesis components around the shared cache.
    pub async fn new(
        config: EngineConfig,
        embedder: EmbeddingBackend,
        generator: GenerationBackend,
        extraction: ExtractionBackend,
    ) -> Result<Self, EngineError> {
        let call_timeout = Duration::from_secs(config.concurrency.call_timeout_secs);
        let retry = RetryPolicy::new(
            config.retry.max_retries,
            config.retry.initial_backoff_ms,
            config.retry.max_backoff_ms,
        );
        let cache = Arc::new(Cache::new(config.cache.max_entries));

        let dimension = embedder.dimension(call_timeout).await?;
        info!(dimension, "embedding backend resolved");

        let coordinator = RetrievalCoordinator::new(
            embedder.clone(),
            Arc::clone(&cache),
            retry.clone(),
            call_timeout,
        );
        let synthesizer = AnswerSynthesizer::new(
            generator,
            Arc::clone(&cache),
            retry.clone(),
            call_timeout,
            config.synthesizer.clone(),
        );
        let extractor = Extractor::new(extraction, call_timeout);
        let embed_permits = Arc::new(Semaphore::new(
            config.concurrency.max_concurrent_embeddings.max(1),
        ));

        Ok(Self {
            config,
            dimension,
            embedder,
            extractor,
            coordinator,
            synthesizer,
            cache,
            retry,
            call_timeout,
            embed_permits,
            collections: RwLock::new(HashMap::new()),
        })
    }

    pub async fn create_collection(&self, name: &str, priority: f32) -> Arc<Collection> {
        let mut collections = self.collections.write().await;
        Arc::clone(collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Collection::new(name.to_string(), priority, self.dimension))
        }))
    }

    async fn collection(&self, name: &str) -> Result<Arc<Collection>, EngineError> {
        self.collections
            .read()
            .await
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| EngineError::UnknownCollection(name.to_string()))
    }

    /// All collections in name order, or the named subset. The fixed order
    /// keeps merged retrieval deterministic.
    async fn select_collections(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<Arc<Collection>>, EngineError> {
        let collections = self.collections.read().await;
        match names {
            Some(names) => names
                .iter()
                .map(|name| {
                    collections
                        .get(name)
                        .map(Arc::clone)
                        .ok_or_else(|| EngineError::UnknownCollection(name.clone()))
                })
                .collect(),
            None => {
                let mut all: Vec<Arc<Collection>> = collections.values().map(Arc::clone).collect();
                all.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(all)
            }
        }
    }

    /// Chunk, embed (bounded concurrency), extract, then publish the whole
    /// document atomically. Cancellation at any point before publish leaves
    /// the collection exactly as it was. Re-ingesting an existing document
    /// id replaces its chunks and graph evidence instead of duplicating.
    pub async fn ingest_document(
        &self,
        collection: &str,
        doc: Document,
        cancel: &CancelToken,
    ) -> Result<IngestOutcome, EngineError> {
        let chunks = chunk_document(&doc, &self.config.chunking)?;
        let coll = self.create_collection(collection, 1.0).await;

        // One build pass at a time per collection.
        let _writer = coll.writer.lock().await;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let embedded = match self.embed_chunks(&chunks, cancel).await {
            Ok(vectors) => vectors,
            Err(EmbedFailure::Cancelled) => return Err(EngineError::Cancelled),
            Err(EmbedFailure::Provider(e)) => {
                warn!(doc_id = %doc.id, error = %e, "embedding pass failed, marking index degraded");
                coll.index.write().await.mark_degraded(e.to_string());
                return Err(EngineError::Provider(e));
            }
        };

        let mut extractions = Vec::with_capacity(chunks.len());
        let mut report = ExtractionReport::default();
        for chunk in &chunks {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let (extraction, chunk_report) = self.extractor.extract_chunk(chunk).await;
            report.merge(chunk_report);
            extractions.push(extraction);
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Publish. Everything is staged; from here on nothing can leave a
        // half-indexed document behind.
        let pairs: Vec<(Chunk, Vec<f32>)> = chunks.into_iter().zip(embedded).collect();
        let chunks_indexed = pairs.len();
        let prior = {
            let mut index = coll.index.write().await;
            let prior = index.doc_chunk_ids(&doc.id);
            index.insert_document(&doc.id, pairs)?;
            prior
        };

        let mut store = coll.graph.write().await;
        if !prior.is_empty() {
            store.remove_evidence(&prior);
        }
        for extraction in &extractions {
            for entity in &extraction.entities {
                store.merge_entity(&entity.name, &entity.entity_type, &extraction.chunk_id);
            }
            for relation in &extraction.relations {
                let source = entity_id(&relation.source.name, &relation.source.entity_type);
                let target = entity_id(&relation.target.name, &relation.target.entity_type);
                store.merge_relation(&source, &target, &relation.label, &extraction.chunk_id);
            }
        }
        drop(store);

        info!(
            doc_id = %doc.id,
            collection,
            chunks_indexed,
            entities = report.entities_found,
            relations = report.relations_found,
            "document ingested"
        );
        Ok(IngestOutcome {
            doc_id: doc.id,
            collection: collection.to_string(),
            chunks_indexed,
            report,
        })
    }

    /// Embed every chunk with the bounded worker pool. Vectors come back in
    /// chunk order regardless of completion order.
    async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        cancel: &CancelToken,
    ) -> Result<Vec<Vec<f32>>, EmbedFailure> {
        let mut handles = Vec::with_capacity(chunks.len());
        for (position, chunk) in chunks.iter().enumerate() {
            let embedder = self.embedder.clone();
            let retry = self.retry.clone();
            let cache = Arc::clone(&self.cache);
            let permits = Arc::clone(&self.embed_permits);
            let cancel = cancel.clone();
            let text = chunk.text.clone();
            let timeout = self.call_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (position, Err(EmbedFailure::Cancelled)),
                };
                if cancel.is_cancelled() {
                    return (position, Err(EmbedFailure::Cancelled));
                }
                if let Some(cached) = cache.get_embedding(&text) {
                    return (position, Ok(cached));
                }
                match retry
                    .retry("embed_chunk", || embedder.embed(&text, timeout))
                    .await
                {
                    Ok(vector) => {
                        cache.set_embedding(&text, vector.clone());
                        (position, Ok(vector))
                    }
                    Err(e) => (position, Err(EmbedFailure::Provider(e))),
                }
            }));
        }

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        let mut failure: Option<EmbedFailure> = None;
        for handle in handles {
            match handle.await {
                Ok((position, Ok(vector))) => vectors[position] = Some(vector),
                Ok((_, Err(e))) => {
                    // A provider error outranks cancellation in the report.
                    if !matches!(failure, Some(EmbedFailure::Provider(_))) {
                        failure = Some(e);
                    }
                }
                Err(join_err) => {
                    failure = Some(EmbedFailure::Provider(ProviderError::Connect(
                        join_err.to_string(),
                    )));
                }
            }
        }
        if let Some(failure) = failure {
            return Err(failure);
        }

        let mut out = Vec::with_capacity(vectors.len());
        for vector in vectors {
            match vector {
                Some(v) => out.push(v),
                None => return Err(EmbedFailure::Cancelled),
            }
        }
        Ok(out)
    }

    /// Remove a document and cascade: its chunks leave the index, their
    /// evidence leaves the graph, and entities or edges whose evidence
    /// becomes empty are dropped.
    pub async fn remove_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<usize, EngineError> {
        let coll = self.collection(collection).await?;
        let _writer = coll.writer.lock().await;

        let removed = coll.index.write().await.remove_document(doc_id)?;
        if !removed.is_empty() {
            coll.graph.write().await.remove_evidence(&removed);
        }
        info!(doc_id, collection, chunks_removed = removed.len(), "document removed");
        Ok(removed.len())
    }

    /// Multi-collection retrieval: embed once, fan out, merge and re-rank.
    /// `collections = None` searches everything.
    pub async fn search(
        &self,
        query: &str,
        collections: Option<&[String]>,
        k: usize,
        min_confidence: Option<f32>,
    ) -> Result<Vec<RetrievalResult>, EngineError> {
        let vector = self.coordinator.embed_query(query).await?;
        let selected = self.select_collections(collections).await?;

        let mut pools = Vec::with_capacity(selected.len());
        for coll in selected {
            let hits = coll.index.read().await.search(&vector, k);
            pools.push(CollectionPool {
                collection: coll.name.clone(),
                priority: coll.priority,
                hits,
            });
        }

        let mut results = self.coordinator.merge_and_rank(pools, k);
        if let Some(min) = min_confidence {
            results.retain(|r| r.confidence >= min);
        }
        Ok(results)
    }

    /// Retrieval-grounded answer. Provider trouble during retrieval yields
    /// a degraded abstain answer rather than an error; only structural
    /// problems (unknown collection) surface as `Err`.
    pub async fn answer(
        &self,
        question: &str,
        collections: Option<&[String]>,
    ) -> Result<Answer, EngineError> {
        let results = match self
            .search(question, collections, self.config.retrieval.top_k, None)
            .await
        {
            Ok(results) => results,
            Err(EngineError::Provider(e)) => {
                warn!(error = %e, "retrieval failed, abstaining");
                return Ok(Answer {
                    text: ABSTAIN_TEXT.to_string(),
                    sources: Vec::new(),
                    confidence: 0.0,
                    degraded: true,
                    reason: Some("retrieval_failed".to_string()),
                });
            }
            Err(e) => return Err(e),
        };
        Ok(self.synthesizer.answer(question, &results).await)
    }

    pub async fn neighbors(
        &self,
        collection: &str,
        entity: &str,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let coll = self.collection(collection).await?;
        let store = coll.graph.read().await;
        Ok(store.neighbors(entity).into_iter().collect())
    }

    /// Bounded shortest path. Unknown endpoints and unreachable targets are
    /// `Ok(None)`, not errors.
    pub async fn find_path(
        &self,
        collection: &str,
        from: &str,
        to: &str,
    ) -> Result<Option<Vec<PathEdge>>, EngineError> {
        let coll = self.collection(collection).await?;
        let store = coll.graph.read().await;
        Ok(shortest_path(
            &store,
            from,
            to,
            self.config.retrieval.max_path_depth,
        ))
    }

    pub async fn export_graph(&self, collection: &str) -> Result<GraphExport, EngineError> {
        let coll = self.collection(collection).await?;
        let store = coll.graph.read().await;
        Ok(GraphExport::from_store(&store))
    }

    pub async fn stats(&self) -> EngineStats {
        let selected = self.select_collections(None).await.unwrap_or_default();
        let mut collections = Vec::with_capacity(selected.len());
        for coll in selected {
            let index = coll.index.read().await;
            let store = coll.graph.read().await;
            collections.push(CollectionStats {
                name: coll.name.clone(),
                documents: index.doc_count(),
                chunks: index.len(),
                state: index.state(),
                entities: store.entity_count(),
                edges: store.edge_count(),
            });
        }
        EngineStats {
            collections,
            cache: self.cache.stats(),
        }
    }

    /// Image every collection under its writer lock so no build pass is
    /// captured halfway.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let selected = self.select_collections(None).await.unwrap_or_default();
        let mut collections = Vec::with_capacity(selected.len());
        for coll in selected {
            let _writer = coll.writer.lock().await;
            collections.push(CollectionSnapshot {
                name: coll.name.clone(),
                priority: coll.priority,
                index: coll.index.read().await.snapshot(),
                graph: coll.graph.read().await.snapshot(),
            });
        }
        EngineSnapshot::new(collections)
    }

    /// Replace all collection state from a snapshot, without re-embedding.
    /// Format, version and embedding dimension are validated up front; on
    /// any mismatch the current state is left untouched.
    pub async fn load_snapshot(&self, snapshot: EngineSnapshot) -> Result<(), EngineError> {
        snapshot.validate()?;
        for cs in &snapshot.collections {
            if cs.index.dimension != self.dimension {
                return Err(EngineError::Snapshot(SnapshotError::DimensionMismatch {
                    expected: self.dimension,
                    got: cs.index.dimension,
                }));
            }
        }

        let mut map = HashMap::with_capacity(snapshot.collections.len());
        for cs in snapshot.collections {
            let name = cs.name.clone();
            let restored = Collection::restore(
                cs.name,
                cs.priority,
                VectorIndex::restore(cs.index),
                GraphStore::restore(cs.graph),
            );
            map.insert(name, Arc::new(restored));
        }

        let count = map.len();
        *self.collections.write().await = map;
        info!(collections = count, "snapshot loaded");
        Ok(())
    }
}
