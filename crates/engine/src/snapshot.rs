use graph::GraphSnapshot;
use index::IndexSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SNAPSHOT_FORMAT: &str = "knowledge-engine-snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unrecognized snapshot format tag: {0}")]
    FormatMismatch(String),
    #[error("incompatible snapshot version: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },
    #[error("snapshot embedding dimension {got} does not match the configured backend ({expected})")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Versioned image of every collection, sufficient to reload without
/// re-embedding. Incompatible snapshots are rejected, never misread.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub format: String,
    pub version: u32,
    pub collections: Vec<CollectionSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub name: String,
    pub priority: f32,
    pub index: IndexSnapshot,
    pub graph: GraphSnapshot,
}

impl EngineSnapshot {
    pub fn new(collections: Vec<CollectionSnapshot>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            collections,
        }
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(SnapshotError::FormatMismatch(self.format.clone()));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: self.version,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(raw)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_format_tag() {
        let raw = r#"{"format":"something-else","version":1,"collections":[]}"#;
        let err = EngineSnapshot::from_json(raw).unwrap_err();
        assert!(matches!(err, SnapshotError::FormatMismatch(_)));
    }

    #[test]
    fn rejects_newer_version() {
        let raw = format!(
            r#"{{"format":"{SNAPSHOT_FORMAT}","version":99,"collections":[]}}"#
        );
        let err = EngineSnapshot::from_json(&raw).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::VersionMismatch { expected: 1, got: 99 }
        ));
    }

    #[test]
    fn empty_snapshot_round_trips() {
        let snapshot = EngineSnapshot::new(Vec::new());
        let raw = snapshot.to_json().unwrap();
        let back = EngineSnapshot::from_json(&raw).unwrap();
        assert_eq!(back.collections.len(), 0);
    }
}
