use ingest::ChunkerConfig;
use query::SynthesizerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chunking: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub synthesizer: SynthesizerConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Depth bound for graph path queries.
    pub max_path_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_embeddings: usize,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            retrieval: RetrievalConfig {
                top_k: 5,
                max_path_depth: 6,
            },
            synthesizer: SynthesizerConfig::default(),
            concurrency: ConcurrencyConfig {
                max_concurrent_embeddings: 4,
                call_timeout_secs: 60,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig { max_entries: 10000 },
        }
    }
}

impl EngineConfig {
    /// Settings for deterministic offline runs: no backoff waits, small
    /// cache, tight timeout.
    pub fn offline() -> Self {
        Self {
            concurrency: ConcurrencyConfig {
                max_concurrent_embeddings: 4,
                call_timeout_secs: 5,
            },
            retry: RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
            cache: CacheConfig { max_entries: 256 },
            ..Self::default()
        }
    }
}
