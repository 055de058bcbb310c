pub mod cache;
pub mod embedding;
pub mod generation;
pub mod retry;

pub use cache::{Cache, CacheStats};
pub use embedding::{EmbeddingBackend, HashedEmbedder, OllamaEmbedder};
pub use generation::{GenerationBackend, GenerationOptions, OllamaGenerator};
pub use retry::RetryPolicy;

use thiserror::Error;

/// Failure of an external capability call (embedding, generation,
/// extraction). Retried with bounded backoff by the caller; never
/// process-fatal.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request timed out after {0} seconds")]
    Timeout(u64),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("failed to reach provider: {0}")]
    Connect(String),
    #[error("provider returned an unparseable response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Connect(err.to_string())
        }
    }
}
