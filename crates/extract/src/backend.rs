use crate::heuristic::HeuristicExtractor;
use crate::llm::OllamaExtractor;
use crate::schema::EntityCandidate;
use provider::ProviderError;
use std::time::Duration;

/// Entity/relation capability, resolved once at engine construction.
#[derive(Clone)]
pub enum ExtractionBackend {
    Ollama(OllamaExtractor),
    Heuristic(HeuristicExtractor),
}

impl ExtractionBackend {
    pub async fn extract_entities(
        &self,
        sentence: &str,
        timeout: Duration,
    ) -> Result<Vec<EntityCandidate>, ProviderError> {
        match self {
            ExtractionBackend::Ollama(client) => client.extract_entities(sentence, timeout).await,
            ExtractionBackend::Heuristic(local) => Ok(local.extract_entities(sentence)),
        }
    }

    pub async fn extract_relation(
        &self,
        sentence: &str,
        entity_a: &str,
        entity_b: &str,
        timeout: Duration,
    ) -> Result<Option<String>, ProviderError> {
        match self {
            ExtractionBackend::Ollama(client) => {
                client
                    .extract_relation(sentence, entity_a, entity_b, timeout)
                    .await
            }
            ExtractionBackend::Heuristic(local) => {
                Ok(local.extract_relation(sentence, entity_a, entity_b))
            }
        }
    }
}
