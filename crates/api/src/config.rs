use engine::EngineConfig;

/// Service configuration, read from the environment. An unset `OLLAMA_URL`
/// selects the offline backends (hashed embeddings, heuristic extraction).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub ollama_url: Option<String>,
    pub embed_model: String,
    pub generate_model: String,
    pub extract_model: String,
    pub hashed_dimension: usize,
    pub snapshot_path: String,
    pub engine: EngineConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            ollama_url: std::env::var("OLLAMA_URL").ok().filter(|v| !v.is_empty()),
            embed_model: env_or("EMBED_MODEL", "nomic-embed-text"),
            generate_model: env_or("GENERATE_MODEL", "llama3.2"),
            extract_model: env_or("EXTRACT_MODEL", "llama3.2"),
            hashed_dimension: std::env::var("HASHED_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            snapshot_path: env_or("SNAPSHOT_PATH", "data/snapshot.json"),
            engine: EngineConfig::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
