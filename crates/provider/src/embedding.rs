use crate::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedding capability, resolved once at engine construction. The Ollama
/// backend talks to a local model server; the hashed backend is a
/// deterministic bag-of-words embedder for offline use and tests.
#[derive(Clone)]
pub enum EmbeddingBackend {
    Ollama(OllamaEmbedder),
    Hashed(HashedEmbedder),
}

impl EmbeddingBackend {
    pub async fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, ProviderError> {
        match self {
            EmbeddingBackend::Ollama(client) => client.embed(text, timeout).await,
            EmbeddingBackend::Hashed(local) => Ok(local.embed(text)),
        }
    }

    /// Probe the backend for its vector dimension.
    pub async fn dimension(&self, timeout: Duration) -> Result<usize, ProviderError> {
        match self {
            EmbeddingBackend::Ollama(client) => {
                let probe = client.embed("dimension probe", timeout).await?;
                Ok(probe.len())
            }
            EmbeddingBackend::Hashed(local) => Ok(local.dimension()),
        }
    }
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub async fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let send = self.client.post(&url).json(&request).send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_secs()))?
            .map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parsed.embedding)
    }
}

/// Deterministic, fast embedding for offline use: each lowercased token is
/// hashed into one of `dim` buckets, then the vector is L2-normalized.
/// Identical text always maps to an identical vector.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dim: usize,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
