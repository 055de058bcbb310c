pub mod vector_index;

pub use vector_index::{IndexError, IndexSnapshot, IndexState, SearchHit, VectorIndex};
