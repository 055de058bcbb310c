mod config;
mod metrics;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use engine::{CancelToken, Engine, EngineError, EngineSnapshot, EngineStats};
use extract::{ExtractionBackend, HeuristicExtractor, OllamaExtractor};
use graph::{GraphExport, PathEdge};
use ingest::Document;
use provider::{
    EmbeddingBackend, GenerationBackend, HashedEmbedder, OllamaEmbedder, OllamaGenerator,
};
use query::Answer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ApiConfig;
use metrics::{Metrics, MetricsSnapshot, TimedOperation};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    metrics: Arc<Metrics>,
    snapshot_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();
    let (embedder, generator, extraction) = build_backends(&config);

    let engine = Engine::new(config.engine.clone(), embedder, generator, extraction)
        .await
        .context("failed to construct engine")?;

    let state = AppState {
        engine: Arc::new(engine),
        metrics: Metrics::new(),
        snapshot_path: config.snapshot_path.clone(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/documents", post(ingest_document))
        .route("/documents/:id", delete(remove_document))
        .route("/search", post(search))
        .route("/answer", post(answer))
        .route("/graph/neighbors/:id", get(neighbors))
        .route("/graph/path", post(find_path))
        .route("/graph/export", get(export_graph))
        .route("/snapshot/save", post(save_snapshot))
        .route("/snapshot/load", post(load_snapshot))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// An Ollama URL in the environment selects the model-server backends;
/// without one the service runs fully offline on the deterministic
/// embedder and the heuristic extractor.
fn build_backends(
    config: &ApiConfig,
) -> (EmbeddingBackend, GenerationBackend, ExtractionBackend) {
    match &config.ollama_url {
        Some(url) => (
            EmbeddingBackend::Ollama(OllamaEmbedder::new(url.clone(), config.embed_model.clone())),
            GenerationBackend::Ollama(OllamaGenerator::new(
                url.clone(),
                config.generate_model.clone(),
            )),
            ExtractionBackend::Ollama(OllamaExtractor::new(
                url.clone(),
                config.extract_model.clone(),
            )),
        ),
        None => {
            tracing::info!("no OLLAMA_URL configured, using offline backends");
            (
                EmbeddingBackend::Hashed(HashedEmbedder::new(config.hashed_dimension)),
                // Offline answers come from the synthesizer's fallback path.
                GenerationBackend::Ollama(OllamaGenerator::new(
                    "http://127.0.0.1:9".to_string(),
                    "unconfigured".to_string(),
                )),
                ExtractionBackend::Heuristic(HeuristicExtractor::new()),
            )
        }
    }
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UnknownCollection(_) => StatusCode::NOT_FOUND,
        EngineError::Ingest(_) => StatusCode::BAD_REQUEST,
        EngineError::Cancelled => StatusCode::CONFLICT,
        EngineError::Provider(_) => StatusCode::BAD_GATEWAY,
        EngineError::Index(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Snapshot(_) => StatusCode::BAD_REQUEST,
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Deserialize)]
struct IngestRequest {
    document_id: String,
    collection: String,
    text: String,
}

#[derive(Serialize)]
struct IngestResponse {
    doc_id: String,
    collection: String,
    chunks_indexed: usize,
    entities_found: usize,
    relations_found: usize,
    errors: Vec<String>,
}

async fn ingest_document(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, StatusCode> {
    let timer = TimedOperation::start();
    let doc = Document::new(req.document_id, req.collection.clone(), req.text);
    let cancel = CancelToken::new();

    let outcome = state
        .engine
        .ingest_document(&req.collection, doc, &cancel)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "ingestion failed");
            state.metrics.record_request(false);
            status_for(&e)
        })?;

    state.metrics.record_ingest(timer.elapsed(), outcome.chunks_indexed);
    state.metrics.record_request(true);
    Ok(Json(IngestResponse {
        doc_id: outcome.doc_id,
        collection: outcome.collection,
        chunks_indexed: outcome.chunks_indexed,
        entities_found: outcome.report.entities_found,
        relations_found: outcome.report.relations_found,
        errors: outcome.report.errors,
    }))
}

#[derive(Deserialize)]
struct CollectionQuery {
    collection: String,
}

#[derive(Serialize)]
struct RemoveResponse {
    doc_id: String,
    chunks_removed: usize,
}

async fn remove_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<RemoveResponse>, StatusCode> {
    let removed = state
        .engine
        .remove_document(&query.collection, &doc_id)
        .await
        .map_err(|e| {
            state.metrics.record_request(false);
            status_for(&e)
        })?;

    state.metrics.record_request(true);
    Ok(Json(RemoveResponse {
        doc_id,
        chunks_removed: removed,
    }))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    collections: Option<Vec<String>>,
    k: Option<usize>,
    min_confidence: Option<f32>,
}

#[derive(Serialize)]
struct SearchResultItem {
    chunk_id: String,
    doc_id: String,
    collection: String,
    text: String,
    similarity: f32,
    confidence: f32,
    rank: usize,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultItem>,
}

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, StatusCode> {
    let timer = TimedOperation::start();
    let results = state
        .engine
        .search(
            &req.query,
            req.collections.as_deref(),
            req.k.unwrap_or(5),
            req.min_confidence,
        )
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "search failed");
            state.metrics.record_request(false);
            status_for(&e)
        })?;

    state.metrics.record_search(timer.elapsed());
    state.metrics.record_request(true);
    Ok(Json(SearchResponse {
        results: results
            .into_iter()
            .map(|r| SearchResultItem {
                chunk_id: r.chunk.chunk_id,
                doc_id: r.chunk.doc_id,
                collection: r.collection,
                text: r.chunk.text,
                similarity: r.similarity,
                confidence: r.confidence,
                rank: r.rank,
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
    collections: Option<Vec<String>>,
}

async fn answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<Answer>, StatusCode> {
    let timer = TimedOperation::start();
    let answer = state
        .engine
        .answer(&req.question, req.collections.as_deref())
        .await
        .map_err(|e| {
            state.metrics.record_request(false);
            status_for(&e)
        })?;

    state.metrics.record_answer(timer.elapsed());
    state.metrics.record_request(true);
    Ok(Json(answer))
}

#[derive(Serialize)]
struct NeighborItem {
    id: String,
    label: String,
}

#[derive(Serialize)]
struct NeighborsResponse {
    entity: String,
    neighbors: Vec<NeighborItem>,
}

async fn neighbors(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<NeighborsResponse>, StatusCode> {
    let neighbors = state
        .engine
        .neighbors(&query.collection, &entity)
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(NeighborsResponse {
        entity,
        neighbors: neighbors
            .into_iter()
            .map(|(id, label)| NeighborItem { id, label })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct PathRequest {
    collection: String,
    from: String,
    to: String,
}

#[derive(Serialize)]
struct PathResponse {
    found: bool,
    path: Vec<PathEdge>,
}

async fn find_path(
    State(state): State<AppState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<PathResponse>, StatusCode> {
    let path = state
        .engine
        .find_path(&req.collection, &req.from, &req.to)
        .await
        .map_err(|e| status_for(&e))?;

    Ok(Json(match path {
        Some(path) => PathResponse { found: true, path },
        None => PathResponse {
            found: false,
            path: Vec::new(),
        },
    }))
}

async fn export_graph(
    State(state): State<AppState>,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<GraphExport>, StatusCode> {
    let export = state
        .engine
        .export_graph(&query.collection)
        .await
        .map_err(|e| status_for(&e))?;
    Ok(Json(export))
}

#[derive(Deserialize, Default)]
struct SnapshotRequest {
    path: Option<String>,
}

#[derive(Serialize)]
struct SnapshotResponse {
    path: String,
    collections: usize,
}

async fn save_snapshot(
    State(state): State<AppState>,
    req: Option<Json<SnapshotRequest>>,
) -> Result<Json<SnapshotResponse>, StatusCode> {
    let path = req
        .and_then(|Json(r)| r.path)
        .unwrap_or_else(|| state.snapshot_path.clone());

    let snapshot = state.engine.snapshot().await;
    let collections = snapshot.collections.len();
    let raw = snapshot.to_json().map_err(|e| {
        tracing::error!(error = %e, "snapshot serialization failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if let Some(parent) = std::path::Path::new(&path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    }
    tokio::fs::write(&path, raw)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(path, collections, "snapshot saved");
    Ok(Json(SnapshotResponse { path, collections }))
}

async fn load_snapshot(
    State(state): State<AppState>,
    req: Option<Json<SnapshotRequest>>,
) -> Result<Json<SnapshotResponse>, StatusCode> {
    let path = req
        .and_then(|Json(r)| r.path)
        .unwrap_or_else(|| state.snapshot_path.clone());

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let snapshot = EngineSnapshot::from_json(&raw).map_err(|e| {
        tracing::warn!(error = %e, "snapshot rejected");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;
    let collections = snapshot.collections.len();

    state.engine.load_snapshot(snapshot).await.map_err(|e| {
        tracing::warn!(error = %e, "snapshot load failed");
        status_for(&e)
    })?;

    Ok(Json(SnapshotResponse { path, collections }))
}

#[derive(Serialize)]
struct StatsResponse {
    engine: EngineStats,
    requests: MetricsSnapshot,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        engine: state.engine.stats().await,
        requests: state.metrics.snapshot(),
    })
}
