use crate::store::GraphStore;
use serde::{Deserialize, Serialize};

/// Wire shape handed to the visualization collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    pub label: String,
    pub confidence: f32,
}

impl GraphExport {
    pub fn from_store(store: &GraphStore) -> Self {
        let mut nodes: Vec<NodeExport> = store
            .entities()
            .map(|e| NodeExport {
                id: e.id.clone(),
                name: e.name.clone(),
                entity_type: e.entity_type.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<(u64, EdgeExport)> = store
            .edges()
            .map(|e| {
                (
                    e.insertion,
                    EdgeExport {
                        source: e.source.clone(),
                        target: e.target.clone(),
                        label: e.label.clone(),
                        confidence: e.confidence(),
                    },
                )
            })
            .collect();
        edges.sort_by_key(|(insertion, _)| *insertion);

        Self {
            nodes,
            edges: edges.into_iter().map(|(_, e)| e).collect(),
        }
    }
}
