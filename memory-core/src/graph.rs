//! Knowledge graph node/edge types (component I).

use crate::enums::RelationshipType;
use crate::identity::{EntityIdType, MemoryId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity node in a user-scoped knowledge graph. The node id is the
/// lowercase-normalized entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub entity_type: String,
    pub name: String,
    pub memory_ids: Vec<MemoryId>,
    pub metadata: Map<String, Value>,
}

impl GraphNode {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: NodeId::now_v7(),
            entity_type: entity_type.into(),
            name: name.into(),
            memory_ids: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Normalize a raw entity name to its node key.
    pub fn normalize_name(raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

/// Typed, directed edge between two graph nodes, attributable to the memory
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relationship: RelationshipType,
    pub memory_id: MemoryId,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_is_case_and_whitespace_insensitive() {
        assert_eq!(GraphNode::normalize_name("  PostgreSQL  "), "postgresql");
    }
}
