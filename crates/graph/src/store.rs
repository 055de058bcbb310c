use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Confidence policy for repeated relation observations: a new edge starts
/// at the baseline, each further observation adds the increment, capped at
/// 1.0. Confidence is derived from the observation count so evidence
/// removal stays reversible.
const CONFIDENCE_BASELINE: f32 = 0.5;
const CONFIDENCE_INCREMENT: f32 = 0.1;

/// Normalize an entity mention to its identity key: case-folded,
/// punctuation stripped, whitespace collapsed.
pub fn canonical_key(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Entity identity is derived from the canonicalized name plus type.
pub fn entity_id(name: &str, entity_type: &str) -> String {
    format!("{}::{}", canonical_key(name), canonical_key(entity_type))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// First-seen surface form, kept for display.
    pub name: String,
    pub entity_type: String,
    /// Evidence chunk id -> mention count observed in that chunk.
    pub evidence: BTreeMap<String, usize>,
}

impl Entity {
    pub fn mention_count(&self) -> usize {
        self.evidence.values().sum()
    }

    pub fn evidence_chunks(&self) -> impl Iterator<Item = &String> {
        self.evidence.keys()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: String,
    /// Evidence chunk id -> observation count from that chunk.
    pub evidence: BTreeMap<String, usize>,
    /// Monotonic counter used as the deterministic path tie-break.
    pub insertion: u64,
}

impl Edge {
    pub fn observations(&self) -> usize {
        self.evidence.values().sum()
    }

    pub fn confidence(&self) -> f32 {
        let n = self.observations();
        if n == 0 {
            return 0.0;
        }
        (CONFIDENCE_BASELINE + CONFIDENCE_INCREMENT * (n as f32 - 1.0)).min(1.0)
    }

    fn key(&self) -> (String, String, String) {
        (self.source.clone(), self.target.clone(), self.label.clone())
    }
}

/// Serializable image of a graph for the snapshot format.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub next_insertion: u64,
}

/// Canonicalizing, deduplicating entity/relation store. One per collection
/// scope; build passes are serialized by the owning engine.
#[derive(Debug, Default)]
pub struct GraphStore {
    entities: HashMap<String, Entity>,
    edges: HashMap<(String, String, String), Edge>,
    /// Entity id -> incident edge keys, both directions.
    adjacency: HashMap<String, Vec<(String, String, String)>>,
    next_insertion: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge(&self, source: &str, target: &str, label: &str) -> Option<&Edge> {
        self.edges
            .get(&(source.to_string(), target.to_string(), label.to_string()))
    }

    /// Merge a mention into the store. A mention whose canonical key already
    /// exists updates the existing entity instead of creating a duplicate.
    pub fn merge_entity(
        &mut self,
        name: &str,
        entity_type: &str,
        evidence_chunk: &str,
    ) -> String {
        let id = entity_id(name, entity_type);
        let entity = self.entities.entry(id.clone()).or_insert_with(|| Entity {
            id: id.clone(),
            name: name.trim().to_string(),
            entity_type: entity_type.trim().to_string(),
            evidence: BTreeMap::new(),
        });
        *entity.evidence.entry(evidence_chunk.to_string()).or_insert(0) += 1;
        id
    }

    /// Merge a relation observation. Deduplicated by the
    /// (source, target, label) triple; repeats accumulate evidence and raise
    /// confidence instead of creating parallel edges. Different labels
    /// between the same pair coexist as distinct edges.
    pub fn merge_relation(
        &mut self,
        source_id: &str,
        target_id: &str,
        label: &str,
        evidence_chunk: &str,
    ) {
        let key = (
            source_id.to_string(),
            target_id.to_string(),
            label.to_string(),
        );

        if !self.edges.contains_key(&key) {
            let edge = Edge {
                source: source_id.to_string(),
                target: target_id.to_string(),
                label: label.to_string(),
                evidence: BTreeMap::new(),
                insertion: self.next_insertion,
            };
            self.next_insertion += 1;
            self.adjacency
                .entry(source_id.to_string())
                .or_default()
                .push(key.clone());
            if source_id != target_id {
                self.adjacency
                    .entry(target_id.to_string())
                    .or_default()
                    .push(key.clone());
            }
            self.edges.insert(key.clone(), edge);
        }

        let edge = self
            .edges
            .get_mut(&key)
            .expect("edge inserted just above");
        *edge.evidence.entry(evidence_chunk.to_string()).or_insert(0) += 1;
    }

    /// Neighbor lookup over both edge directions. Deterministically ordered.
    pub fn neighbors(&self, entity_id: &str) -> BTreeSet<(String, String)> {
        let mut out = BTreeSet::new();
        if let Some(keys) = self.adjacency.get(entity_id) {
            for key in keys {
                if let Some(edge) = self.edges.get(key) {
                    let other = if edge.source == entity_id {
                        &edge.target
                    } else {
                        &edge.source
                    };
                    out.insert((other.clone(), edge.label.clone()));
                }
            }
        }
        out
    }

    /// Incident edges sorted by insertion index; the traversal order that
    /// makes path tie-breaks reproducible.
    pub(crate) fn incident_edges(&self, entity_id: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .adjacency
            .get(entity_id)
            .into_iter()
            .flatten()
            .filter_map(|key| self.edges.get(key))
            .collect();
        edges.sort_by_key(|e| e.insertion);
        edges
    }

    /// Cascade removal of a document's chunks: mentions and observations
    /// backed by the removed chunks are dropped, and entities or edges whose
    /// evidence becomes empty disappear. Evidence shared with retained
    /// chunks survives.
    pub fn remove_evidence(&mut self, chunk_ids: &[String]) {
        for entity in self.entities.values_mut() {
            for chunk_id in chunk_ids {
                entity.evidence.remove(chunk_id);
            }
        }
        for edge in self.edges.values_mut() {
            for chunk_id in chunk_ids {
                edge.evidence.remove(chunk_id);
            }
        }

        let removed_entities: Vec<String> = self
            .entities
            .values()
            .filter(|e| e.evidence.is_empty())
            .map(|e| e.id.clone())
            .collect();
        for id in &removed_entities {
            self.entities.remove(id);
        }

        self.edges.retain(|_, edge| {
            !edge.evidence.is_empty()
                && self.entities.contains_key(&edge.source)
                && self.entities.contains_key(&edge.target)
        });

        // Rebuild adjacency from the surviving edges.
        self.adjacency.clear();
        let keys: Vec<_> = self.edges.values().map(|e| e.key()).collect();
        for key in keys {
            self.adjacency.entry(key.0.clone()).or_default().push(key.clone());
            if key.0 != key.1 {
                self.adjacency.entry(key.1.clone()).or_default().push(key);
            }
        }

        debug!(
            removed_entities = removed_entities.len(),
            entities = self.entities.len(),
            edges = self.edges.len(),
            "evidence cascade applied"
        );
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<Edge> = self.edges.values().cloned().collect();
        edges.sort_by_key(|e| e.insertion);
        GraphSnapshot {
            entities,
            edges,
            next_insertion: self.next_insertion,
        }
    }

    pub fn restore(snapshot: GraphSnapshot) -> Self {
        let mut store = Self {
            next_insertion: snapshot.next_insertion,
            ..Self::default()
        };
        for entity in snapshot.entities {
            store.entities.insert(entity.id.clone(), entity);
        }
        for edge in snapshot.edges {
            let key = edge.key();
            store.adjacency.entry(key.0.clone()).or_default().push(key.clone());
            if key.0 != key.1 {
                store.adjacency.entry(key.1.clone()).or_default().push(key.clone());
            }
            store.edges.insert(key, edge);
        }
        store
    }
}
