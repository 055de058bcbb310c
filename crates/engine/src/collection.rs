use graph::GraphStore;
use index::VectorIndex;
use tokio::sync::{Mutex, RwLock};

/// One named collection scope: a vector index and a graph sharing an
/// embedding space. Build passes are serialized by `writer`, which is
/// held across staging and publish; staging (embedding, extraction)
/// touches neither `RwLock`, so readers only ever block for the short
/// publish window.
pub struct Collection {
    pub name: String,
    pub priority: f32,
    pub index: RwLock<VectorIndex>,
    pub graph: RwLock<GraphStore>,
    pub writer: Mutex<()>,
}

impl Collection {
    pub fn new(name: String, priority: f32, dimension: usize) -> Self {
        Self {
            name,
            priority,
            index: RwLock::new(VectorIndex::new(dimension)),
            graph: RwLock::new(GraphStore::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn restore(
        name: String,
        priority: f32,
        index: VectorIndex,
        graph: GraphStore,
    ) -> Self {
        Self {
            name,
            priority,
            index: RwLock::new(index),
            graph: RwLock::new(graph),
            writer: Mutex::new(()),
        }
    }
}
