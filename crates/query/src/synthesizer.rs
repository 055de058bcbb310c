use crate::retrieval::RetrievalResult;
use provider::{Cache, GenerationBackend, GenerationOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const ABSTAIN_TEXT: &str = "insufficient context";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Below this top-result confidence the synthesizer abstains instead of
    /// generating.
    pub abstain_threshold: f32,
    pub max_context_chunks: usize,
    pub options: GenerationOptions,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            abstain_threshold: 0.3,
            max_context_chunks: 5,
            options: GenerationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: String,
    pub doc_id: String,
    pub collection: String,
    pub confidence: f32,
}

/// The grounded answer returned to the caller. Failures never surface as
/// errors: abstention and generation trouble both arrive as an `Answer`
/// with a reason code, and `degraded` flags the fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub degraded: bool,
    pub reason: Option<String>,
}

impl Answer {
    fn abstain() -> Self {
        Self {
            text: ABSTAIN_TEXT.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
            degraded: false,
            reason: Some("low_retrieval_confidence".to_string()),
        }
    }
}

pub struct AnswerSynthesizer {
    generator: GenerationBackend,
    cache: Arc<Cache>,
    retry: RetryPolicy,
    call_timeout: Duration,
    config: SynthesizerConfig,
}

impl AnswerSynthesizer {
    pub fn new(
        generator: GenerationBackend,
        cache: Arc<Cache>,
        retry: RetryPolicy,
        call_timeout: Duration,
        config: SynthesizerConfig,
    ) -> Self {
        Self {
            generator,
            cache,
            retry,
            call_timeout,
            config,
        }
    }

    pub async fn answer(&self, question: &str, results: &[RetrievalResult]) -> Answer {
        let top_confidence = results.first().map(|r| r.confidence).unwrap_or(0.0);
        if results.is_empty() || top_confidence < self.config.abstain_threshold {
            info!(
                top_confidence,
                threshold = self.config.abstain_threshold,
                "abstaining instead of generating an unfounded answer"
            );
            return Answer::abstain();
        }

        let sources: Vec<SourceRef> = results
            .iter()
            .take(self.config.max_context_chunks)
            .map(|r| SourceRef {
                chunk_id: r.chunk.chunk_id.clone(),
                doc_id: r.chunk.doc_id.clone(),
                collection: r.collection.clone(),
                confidence: r.confidence,
            })
            .collect();

        let prompt = build_answer_prompt(question, results, self.config.max_context_chunks);

        if let Some(cached) = self.cache.get_completion(&prompt) {
            return Answer {
                text: cached,
                sources,
                confidence: top_confidence,
                degraded: false,
                reason: None,
            };
        }

        let generated = self
            .retry
            .retry("generate_answer", || {
                self.generator
                    .generate(&prompt, &self.config.options, self.call_timeout)
            })
            .await;

        match generated {
            Ok(text) => {
                self.cache.set_completion(&prompt, text.clone());
                Answer {
                    text,
                    sources,
                    confidence: top_confidence,
                    degraded: false,
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "generation failed after retries, returning fallback");
                let excerpt: String = results[0].chunk.text.chars().take(300).collect();
                Answer {
                    text: format!(
                        "The answer could not be generated right now. \
                         The most relevant retrieved passage is:\n\n{excerpt}"
                    ),
                    sources,
                    confidence: 0.0,
                    degraded: true,
                    reason: Some("generation_failed".to_string()),
                }
            }
        }
    }
}

fn build_answer_prompt(question: &str, results: &[RetrievalResult], max_chunks: usize) -> String {
    let mut context = String::new();
    for (i, result) in results.iter().take(max_chunks).enumerate() {
        context.push_str(&format!(
            "[Chunk {} | {}] {}\n\n",
            i + 1,
            result.collection,
            result.chunk.text
        ));
    }

    format!(
        r#"You are a research assistant answering questions from retrieved document excerpts.

CONTEXT:
{}

USER QUESTION: {}

INSTRUCTIONS:
- Answer using only information from the context above
- Cite the chunk numbers you relied on
- If the context does not contain enough information, say so
- Keep the answer concise and factual

ANSWER:"#,
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use ingest::Chunk;
    use provider::OllamaGenerator;

    fn result(text: &str, confidence: f32, rank: usize) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk::new(
                "doc".to_string(),
                text.to_string(),
                "src".to_string(),
                (0, text.len()),
                rank,
            ),
            collection: "papers".to_string(),
            similarity: confidence,
            confidence,
            rank,
        }
    }

    fn synthesizer(base_url: String, config: SynthesizerConfig) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            GenerationBackend::Ollama(OllamaGenerator::new(base_url, "test-model".into())),
            Arc::new(Cache::new(16)),
            RetryPolicy::none(),
            Duration::from_secs(5),
            config,
        )
    }

    #[tokio::test]
    async fn abstains_below_threshold_without_calling_generation() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": "should not happen" }));
        });

        let s = synthesizer(server.base_url(), SynthesizerConfig::default());
        let answer = s.answer("question?", &[result("ctx", 0.1, 0)]).await;

        assert_eq!(answer.text, ABSTAIN_TEXT);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.confidence, 0.0);
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn empty_retrieval_abstains() {
        let server = MockServer::start();
        let s = synthesizer(server.base_url(), SynthesizerConfig::default());
        let answer = s.answer("question?", &[]).await;
        assert_eq!(answer.text, ABSTAIN_TEXT);
        assert!(!answer.degraded);
    }

    #[tokio::test]
    async fn grounded_answer_carries_sources_and_confidence() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": "Grounded answer." }));
        });

        let s = synthesizer(server.base_url(), SynthesizerConfig::default());
        let results = vec![result("relevant text", 0.9, 0), result("more text", 0.6, 1)];
        let answer = s.answer("question?", &results).await;

        assert_eq!(answer.text, "Grounded answer.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].collection, "papers");
        assert!((answer.confidence - 0.9).abs() < 1e-6);
        assert!(!answer.degraded);
    }

    #[tokio::test]
    async fn generation_failure_returns_flagged_fallback_not_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(500);
        });

        let s = synthesizer(server.base_url(), SynthesizerConfig::default());
        let answer = s.answer("question?", &[result("the best passage", 0.9, 0)]).await;

        assert!(answer.degraded);
        assert_eq!(answer.reason.as_deref(), Some("generation_failed"));
        assert!(answer.text.contains("the best passage"));
        assert!(!answer.sources.is_empty());
        assert_eq!(answer.confidence, 0.0);
    }

    #[tokio::test]
    async fn repeated_question_is_served_from_the_completion_cache() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(200)
                .json_body(serde_json::json!({ "response": "cached answer" }));
        });

        let s = synthesizer(server.base_url(), SynthesizerConfig::default());
        let results = vec![result("ctx", 0.9, 0)];
        let first = s.answer("question?", &results).await;
        let second = s.answer("question?", &results).await;

        assert_eq!(first.text, second.text);
        assert_eq!(mock.hits(), 1);
    }
}
