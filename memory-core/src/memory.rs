//! The canonical [`Memory`] record, its [`Provenance`] attribution, and
//! [`MemoryBlock`]s used by context assembly.

use crate::enums::{BlockType, MemoryType};
use crate::identity::{EntityIdType, MemoryId, ProvenanceId, Timestamp, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical unit of stored memory.
///
/// Invariants: `user_id` is immutable after creation; `last_accessed_at >=
/// created_at`; a memory whose `metadata["is_valid"]` is explicitly `false`
/// is hidden from retrieval (but not deleted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub user_id: UserId,
    pub content: String,
    pub memory_type: MemoryType,
    pub confidence: f32,
    pub source: String,
    pub created_at: Timestamp,
    pub last_accessed_at: Timestamp,
    pub last_modified_at: Timestamp,
    pub metadata: Map<String, Value>,
    pub provenance: Option<Provenance>,
    pub expires_at: Option<Timestamp>,
}

impl Memory {
    /// Construct a new memory with freshly minted id and timestamps.
    pub fn new(
        user_id: UserId,
        content: impl Into<String>,
        memory_type: MemoryType,
        confidence: f32,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::now_v7(),
            user_id,
            content: content.into(),
            memory_type,
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            created_at: now,
            last_accessed_at: now,
            last_modified_at: now,
            metadata: Map::new(),
            provenance: None,
            expires_at: None,
        }
    }

    /// `true` when `metadata["is_valid"]` is explicitly `false`.
    pub fn is_hidden(&self) -> bool {
        matches!(self.metadata.get("is_valid"), Some(Value::Bool(false)))
    }

    /// Append an audit entry to `metadata.update_history` and bump
    /// `last_modified_at`. Mirrors the "updates are audited" invariant.
    pub fn record_update(&mut self, summary: impl Into<String>) {
        let entry = serde_json::json!({
            "at": Utc::now().to_rfc3339(),
            "summary": summary.into(),
        });
        let history = self
            .metadata
            .entry("update_history")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(arr) = history {
            arr.push(entry);
        } else {
            *history = Value::Array(vec![entry]);
        }
        self.last_modified_at = Utc::now();
    }

    /// Touch `last_accessed_at` on retrieval.
    pub fn touch_accessed(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Source attribution for retrieved or assembled content.
///
/// Field-level bounds (string length, metadata shape) are enforced by the
/// provenance service (`memory-context`), not here; this is the bare data
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub id: ProvenanceId,
    pub source_id: String,
    pub source_type: String,
    pub confidence: f32,
    pub created_at: Timestamp,
    pub retrieval_score: Option<f32>,
    pub metadata: Option<Value>,
}

impl Provenance {
    pub fn new(source_id: impl Into<String>, source_type: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: ProvenanceId::now_v7(),
            source_id: source_id.into(),
            source_type: source_type.into(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
            retrieval_score: None,
            metadata: None,
        }
    }

    pub fn with_retrieval_score(mut self, score: f32) -> Self {
        self.retrieval_score = Some(score);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One of the five blocks assembled into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub block_type: BlockType,
    pub content: String,
    pub token_count: u32,
    pub priority: u8,
    pub metadata: Map<String, Value>,
    pub provenance: Option<Provenance>,
}

impl MemoryBlock {
    pub fn new(block_type: BlockType, content: impl Into<String>, token_count: u32) -> Self {
        Self {
            priority: block_type.default_priority(),
            block_type,
            content: content.into(),
            token_count,
            metadata: Map::new(),
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_has_consistent_timestamps() {
        let m = Memory::new(UserId::now_v7(), "hello", MemoryType::Fact, 0.9, "test");
        assert!(m.last_accessed_at >= m.created_at);
        assert!(!m.is_hidden());
    }

    #[test]
    fn hidden_when_is_valid_false() {
        let mut m = Memory::new(UserId::now_v7(), "hello", MemoryType::Fact, 0.9, "test");
        m.metadata.insert("is_valid".into(), Value::Bool(false));
        assert!(m.is_hidden());
    }

    #[test]
    fn record_update_appends_audit_entry() {
        let mut m = Memory::new(UserId::now_v7(), "hello", MemoryType::Fact, 0.9, "test");
        let before = m.last_modified_at;
        m.record_update("content changed");
        let history = m.metadata.get("update_history").unwrap().as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert!(m.last_modified_at >= before);
    }

    #[test]
    fn confidence_is_clamped() {
        let m = Memory::new(UserId::now_v7(), "x", MemoryType::Fact, 5.0, "test");
        assert_eq!(m.confidence, 1.0);
    }
}
