pub mod export;
pub mod query;
pub mod store;

pub use export::{EdgeExport, GraphExport, NodeExport};
pub use query::{PathEdge, shortest_path};
pub use store::{Edge, Entity, GraphSnapshot, GraphStore, canonical_key, entity_id};
