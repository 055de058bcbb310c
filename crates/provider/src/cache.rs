use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Content-hash keyed cache consulted by the retrieval coordinator (query
/// embeddings) and the answer synthesizer (completions). Size-bound with a
/// coarse eviction policy: drop a quarter of the entries when full.
pub struct Cache {
    embeddings: Arc<DashMap<String, Vec<f32>>>,
    completions: Arc<DashMap<String, String>>,
    max_entries: usize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            embeddings: Arc::new(DashMap::new()),
            completions: Arc::new(DashMap::new()),
            max_entries: max_entries.max(4),
        }
    }

    pub fn set_embedding(&self, text: &str, embedding: Vec<f32>) {
        Self::evict_if_full(&self.embeddings, self.max_entries);
        self.embeddings.insert(hash_text(text), embedding);
    }

    pub fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.embeddings.get(&hash_text(text)).map(|r| r.value().clone())
    }

    pub fn set_completion(&self, prompt: &str, completion: String) {
        Self::evict_if_full(&self.completions, self.max_entries);
        self.completions.insert(hash_text(prompt), completion);
    }

    pub fn get_completion(&self, prompt: &str) -> Option<String> {
        self.completions.get(&hash_text(prompt)).map(|r| r.value().clone())
    }

    fn evict_if_full<V>(map: &DashMap<String, V>, max_entries: usize) {
        if map.len() >= max_entries {
            let to_remove: Vec<_> = map
                .iter()
                .take(max_entries / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                map.remove(&key);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            completions_cached: self.completions.len(),
        }
    }

    pub fn clear(&self) {
        self.embeddings.clear();
        self.completions.clear();
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub completions_cached: usize,
}
