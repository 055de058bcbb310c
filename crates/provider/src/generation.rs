use crate::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// Generation capability, resolved once at engine construction.
#[derive(Clone)]
pub enum GenerationBackend {
    Ollama(OllamaGenerator),
}

impl GenerationBackend {
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        match self {
            GenerationBackend::Ollama(client) => client.generate(prompt, options, timeout).await,
        }
    }
}

#[derive(Clone)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let send = self.client.post(&url).json(&request).send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::Timeout(timeout.as_secs()))?
            .map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty completion".to_string(),
            ));
        }

        Ok(text)
    }
}
