use crate::prompt;
use crate::schema::EntityCandidate;
use provider::ProviderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama-backed extraction capability. Forces JSON output and parses the
/// fixed schemas from `prompt`.
#[derive(Clone)]
pub struct OllamaExtractor {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Deserialize)]
struct EntityList {
    entities: Vec<EntityCandidate>,
}

#[derive(Deserialize)]
struct RelationAnswer {
    relation: Option<String>,
}

impl OllamaExtractor {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    async fn generate_json(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json".to_string(),
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

        Ok(parsed.response)
    }

    pub async fn extract_entities(
        &self,
        sentence: &str,
        timeout: Duration,
    ) -> Result<Vec<EntityCandidate>, ProviderError> {
        let prompt = prompt::build_entity_prompt(sentence);
        let json = self.generate_json(&prompt, timeout).await?;

        let parsed: EntityList = serde_json::from_str(&json)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .entities
            .into_iter()
            .filter(|e| !e.name.trim().is_empty())
            .collect())
    }

    pub async fn extract_relation(
        &self,
        sentence: &str,
        entity_a: &str,
        entity_b: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ProviderError> {
        let prompt = prompt::build_relation_prompt(sentence, entity_a, entity_b);
        let json = self.generate_json(&prompt, timeout).await?;

        let parsed: RelationAnswer = serde_json::from_str(&json)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .relation
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty() && r != "null"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn parses_entity_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200).json_body(serde_json::json!({
                "response": r#"{"entities":[{"name":"Einstein","type":"PERSON"},{"name":"theory of relativity","type":"CONCEPT"}]}"#
            }));
        });

        let extractor = OllamaExtractor::new(server.base_url(), "test-model".into());
        let entities = extractor
            .extract_entities("Einstein developed the theory of relativity.", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "Einstein");
        assert_eq!(entities[1].entity_type, "CONCEPT");
    }

    #[tokio::test]
    async fn null_relation_means_no_edge() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": r#"{"relation":null}"# }));
        });

        let extractor = OllamaExtractor::new(server.base_url(), "test-model".into());
        let relation = extractor
            .extract_relation("Some sentence.", "A", "B", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(relation.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_a_provider_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": "not json at all" }));
        });

        let extractor = OllamaExtractor::new(server.base_url(), "test-model".into());
        let err = extractor
            .extract_entities("Sentence.", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
