use crate::schema::EntityCandidate;
use regex::Regex;
use std::collections::HashSet;

/// No-network extraction fallback used when no model server is configured.
/// Entities are capitalized token spans; the relation label is the first
/// content word between the two mentions.
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    span_re: Regex,
    stopwords: HashSet<&'static str>,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "their", "then", "this", "to",
    "was", "were", "which", "with",
];

impl HeuristicExtractor {
    pub fn new() -> Self {
        // One or more capitalized words in a row form a single span.
        let span_re = Regex::new(r"\b[A-Z][A-Za-z0-9]*(?:\s+[A-Z][A-Za-z0-9]*)*\b")
            .expect("capitalized-span pattern is valid");
        Self {
            span_re,
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    pub fn extract_entities(&self, sentence: &str) -> Vec<EntityCandidate> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for m in self.span_re.find_iter(sentence) {
            let name = m.as_str().trim().to_string();
            if name.len() < 2 || self.stopwords.contains(name.to_lowercase().as_str()) {
                continue;
            }
            if !seen.insert(name.to_lowercase()) {
                continue;
            }

            let entity_type = if name.len() > 1 && name.chars().all(|c| c.is_uppercase()) {
                "ORGANIZATION"
            } else {
                "CONCEPT"
            };
            entities.push(EntityCandidate {
                name,
                entity_type: entity_type.to_string(),
            });
        }

        entities
    }

    /// Relation label = first non-stopword token strictly between the two
    /// mentions, lowercased and trimmed of punctuation. No such token means
    /// no edge.
    pub fn extract_relation(
        &self,
        sentence: &str,
        entity_a: &str,
        entity_b: &str,
    ) -> Option<String> {
        let pos_a = sentence.find(entity_a)?;
        let pos_b = sentence.find(entity_b)?;

        let (between_start, between_end) = if pos_a < pos_b {
            (pos_a + entity_a.len(), pos_b)
        } else {
            (pos_b + entity_b.len(), pos_a)
        };
        if between_start >= between_end {
            return None;
        }

        sentence[between_start..between_end]
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .find(|t| t.len() >= 2 && !self.stopwords.contains(t.as_str()))
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}
