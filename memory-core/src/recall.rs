//! Recall health data types (component N).

use crate::identity::Timestamp;
use serde::{Deserialize, Serialize};

/// A persisted recall@k measurement used as a drift-detection reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallBaseline {
    pub recall_at_k: f32,
    pub k: usize,
    pub query_count: usize,
    pub embedding_model: String,
    pub embedding_version: String,
    pub created_at: Timestamp,
    pub corpus_size: usize,
    pub filtered: bool,
    pub filter_description: Option<String>,
}

/// Fingerprint of an embedding model configuration, used to detect when a
/// reindex is mandatory (model swap, dimension change, config drift).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVersion {
    pub model_id: String,
    pub version_hash: String,
    pub dimension: usize,
    pub created_at: Timestamp,
    pub config_snapshot: Option<serde_json::Value>,
}

impl EmbeddingVersion {
    /// `true` when `current` requires a reindex relative to `stored`.
    pub fn requires_reindex(stored: &EmbeddingVersion, current: &EmbeddingVersion) -> bool {
        stored.model_id != current.model_id
            || stored.dimension != current.dimension
            || stored.version_hash != current.version_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(model: &str, dim: usize, hash: &str) -> EmbeddingVersion {
        EmbeddingVersion {
            model_id: model.into(),
            version_hash: hash.into(),
            dimension: dim,
            created_at: Utc::now(),
            config_snapshot: None,
        }
    }

    #[test]
    fn identical_versions_need_no_reindex() {
        let a = version("m", 768, "abc");
        let b = version("m", 768, "abc");
        assert!(!EmbeddingVersion::requires_reindex(&a, &b));
    }

    #[test]
    fn dimension_change_requires_reindex() {
        let a = version("m", 768, "abc");
        let b = version("m", 1536, "abc");
        assert!(EmbeddingVersion::requires_reindex(&a, &b));
    }
}
