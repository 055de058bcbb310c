pub mod backend;
pub mod heuristic;
pub mod llm;
pub mod prompt;
pub mod schema;
pub mod sentences;

pub use backend::ExtractionBackend;
pub use heuristic::HeuristicExtractor;
pub use llm::OllamaExtractor;
pub use schema::{ChunkExtraction, EntityCandidate, ExtractionReport, RelationCandidate};

use ingest::Chunk;
use std::time::Duration;
use tracing::debug;

pub struct Extractor {
    backend: ExtractionBackend,
    call_timeout: Duration,
}

impl Extractor {
    pub fn new(backend: ExtractionBackend, call_timeout: Duration) -> Self {
        Self {
            backend,
            call_timeout,
        }
    }

    /// Extract entities and relations from one chunk. Sentence-level
    /// failures are recorded in the report and skipped; the pass itself
    /// never fails.
    pub async fn extract_chunk(&self, chunk: &Chunk) -> (ChunkExtraction, ExtractionReport) {
        let mut extraction = ChunkExtraction {
            chunk_id: chunk.chunk_id.clone(),
            doc_id: chunk.doc_id.clone(),
            entities: Vec::new(),
            relations: Vec::new(),
        };
        let mut report = ExtractionReport {
            chunks_processed: 1,
            ..Default::default()
        };

        for sentence in sentences::split_sentences(&chunk.text) {
            let entities = match self.backend.extract_entities(&sentence, self.call_timeout).await
            {
                Ok(entities) => entities,
                Err(e) => {
                    report.sentences_skipped += 1;
                    report
                        .errors
                        .push(format!("entities [{}]: {e}", preview(&sentence)));
                    continue;
                }
            };
            report.sentences_processed += 1;

            // Every unordered pair within the same sentence is a relation
            // candidate.
            for i in 0..entities.len() {
                for j in (i + 1)..entities.len() {
                    match self
                        .backend
                        .extract_relation(
                            &sentence,
                            &entities[i].name,
                            &entities[j].name,
                            self.call_timeout,
                        )
                        .await
                    {
                        Ok(Some(label)) => {
                            extraction.relations.push(RelationCandidate {
                                source: entities[i].clone(),
                                target: entities[j].clone(),
                                label,
                            });
                        }
                        Ok(None) => {}
                        Err(e) => {
                            report
                                .errors
                                .push(format!("relation [{}]: {e}", preview(&sentence)));
                        }
                    }
                }
            }

            extraction.entities.extend(entities);
        }

        report.entities_found = extraction.entities.len();
        report.relations_found = extraction.relations.len();
        debug!(
            chunk_id = %chunk.chunk_id,
            entities = report.entities_found,
            relations = report.relations_found,
            skipped = report.sentences_skipped,
            "chunk extraction finished"
        );

        (extraction, report)
    }
}

fn preview(sentence: &str) -> String {
    sentence.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(
            "doc-1".into(),
            text.into(),
            "test".into(),
            (0, text.chars().count()),
            0,
        )
    }

    #[tokio::test]
    async fn extracts_entities_and_relations_per_sentence() {
        let extractor = Extractor::new(
            ExtractionBackend::Heuristic(HeuristicExtractor::new()),
            Duration::from_secs(1),
        );

        let (extraction, report) = extractor
            .extract_chunk(&chunk("Alice met Bob. Carol visited Paris."))
            .await;

        assert_eq!(report.sentences_processed, 2);
        assert_eq!(report.sentences_skipped, 0);
        assert!(extraction.entities.iter().any(|e| e.name == "Alice"));
        assert!(extraction.entities.iter().any(|e| e.name == "Paris"));
        assert!(
            extraction
                .relations
                .iter()
                .any(|r| r.source.name == "Alice" && r.target.name == "Bob" && r.label == "met")
        );
        // No cross-sentence pairs.
        assert!(
            !extraction
                .relations
                .iter()
                .any(|r| r.source.name == "Bob" && r.target.name == "Carol")
        );
    }

    #[tokio::test]
    async fn entityless_text_yields_empty_extraction() {
        let extractor = Extractor::new(
            ExtractionBackend::Heuristic(HeuristicExtractor::new()),
            Duration::from_secs(1),
        );

        let (extraction, report) = extractor
            .extract_chunk(&chunk("nothing capitalized appears anywhere here."))
            .await;

        assert!(extraction.entities.is_empty());
        assert!(extraction.relations.is_empty());
        assert!(report.errors.is_empty());
    }
}
