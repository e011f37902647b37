//! Bounded, LRU-evicted provenance store and retrieval history with
//! strict DoS-hardened validation (component K).

use memory_core::{EntityIdType, Memory, MemoryId, Provenance, ProvenanceId, ProvenanceLimits, ValidationError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

fn validate_string_field(field: &str, value: &str, limits: &ProvenanceLimits) -> Result<(), ValidationError> {
    if value.len() > limits.max_id_len {
        return Err(ValidationError::ExceedsLimit {
            field: field.to_string(),
            reason: format!("exceeds limit: length {} > {}", value.len(), limits.max_id_len),
        });
    }
    Ok(())
}

/// Recursively validate a metadata value against DoS bounds: nesting depth,
/// total element count, object key count/length, string value length.
/// `serde_json::Value` already restricts types to JSON primitives, so no
/// separate "no bytes / no custom objects" check is needed here.
fn validate_metadata_shape(
    value: &Value,
    depth: usize,
    limits: &ProvenanceLimits,
    total_elements: &mut usize,
    total_keys: &mut usize,
) -> Result<(), ValidationError> {
    if depth > limits.max_depth {
        return Err(ValidationError::ExceedsLimit {
            field: "metadata".to_string(),
            reason: format!("exceeds limit: nesting depth > {}", limits.max_depth),
        });
    }

    *total_elements += 1;
    if *total_elements > limits.max_elements {
        return Err(ValidationError::ExceedsLimit {
            field: "metadata".to_string(),
            reason: format!("exceeds limit: total elements > {}", limits.max_elements),
        });
    }

    match value {
        Value::String(s) => {
            if s.len() > limits.max_value_len {
                return Err(ValidationError::ExceedsLimit {
                    field: "metadata".to_string(),
                    reason: format!("exceeds limit: value length {} > {}", s.len(), limits.max_value_len),
                });
            }
        }
        Value::Array(arr) => {
            for item in arr {
                validate_metadata_shape(item, depth + 1, limits, total_elements, total_keys)?;
            }
        }
        Value::Object(map) => {
            *total_keys += map.len();
            if *total_keys > limits.max_key_count {
                return Err(ValidationError::ExceedsLimit {
                    field: "metadata".to_string(),
                    reason: format!("exceeds limit: key count > {}", limits.max_key_count),
                });
            }
            for (key, val) in map {
                if key.len() > limits.max_key_len {
                    return Err(ValidationError::ExceedsLimit {
                        field: "metadata".to_string(),
                        reason: format!("exceeds limit: key length {} > {}", key.len(), limits.max_key_len),
                    });
                }
                validate_metadata_shape(val, depth + 1, limits, total_elements, total_keys)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_metadata(value: &Value, limits: &ProvenanceLimits) -> Result<(), ValidationError> {
    let serialized = serde_json::to_vec(value).map_err(|e| ValidationError::InvalidValue {
        field: "metadata".to_string(),
        reason: e.to_string(),
    })?;
    if serialized.len() > limits.max_serialized_bytes {
        return Err(ValidationError::ExceedsLimit {
            field: "metadata".to_string(),
            reason: format!(
                "exceeds limit: serialized size {} > {}",
                serialized.len(),
                limits.max_serialized_bytes
            ),
        });
    }
    let mut total_elements = 0usize;
    let mut total_keys = 0usize;
    validate_metadata_shape(value, 0, limits, &mut total_elements, &mut total_keys)
}

/// Validate a fully-constructed `Provenance` against the same bounds
/// `create_provenance` enforces, so `attach_to_memory` cannot be bypassed by
/// constructing the struct directly.
pub fn validate_provenance(provenance: &Provenance, limits: &ProvenanceLimits) -> Result<(), ValidationError> {
    validate_string_field("source_id", &provenance.source_id, limits)?;
    validate_string_field("source_type", &provenance.source_type, limits)?;
    if let Some(metadata) = &provenance.metadata {
        validate_metadata(metadata, limits)?;
    }
    Ok(())
}

/// Construct a validated `Provenance`, rejecting oversized/too-deep metadata
/// before it is ever attached to a memory.
pub fn create_provenance(
    source_id: impl Into<String>,
    source_type: impl Into<String>,
    confidence: f32,
    metadata: Option<Value>,
    limits: &ProvenanceLimits,
) -> Result<Provenance, ValidationError> {
    let mut provenance = Provenance::new(source_id, source_type, confidence);
    validate_string_field("source_id", &provenance.source_id, limits)?;
    validate_string_field("source_type", &provenance.source_type, limits)?;
    if let Some(metadata) = metadata {
        validate_metadata(&metadata, limits)?;
        provenance = provenance.with_metadata(metadata);
    }
    Ok(provenance)
}

struct StoreEntry {
    provenance: Provenance,
    last_used: u64,
}

struct RetrievalRecord {
    query: String,
    score: f32,
    at: chrono::DateTime<chrono::Utc>,
}

struct Inner {
    entries: HashMap<ProvenanceId, StoreEntry>,
    retrieval_history: HashMap<MemoryId, Vec<RetrievalRecord>>,
    clock: u64,
}

/// Bounded provenance store (LRU-evicted) plus a per-memory retrieval-history
/// ring buffer, both validated at every API boundary.
pub struct ProvenanceService {
    limits: ProvenanceLimits,
    inner: Mutex<Inner>,
}

impl ProvenanceService {
    pub fn new(limits: ProvenanceLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                retrieval_history: HashMap::new(),
                clock: 0,
            }),
        }
    }

    pub fn create_provenance(
        &self,
        source_id: impl Into<String>,
        source_type: impl Into<String>,
        confidence: f32,
        metadata: Option<Value>,
    ) -> Result<Provenance, ValidationError> {
        create_provenance(source_id, source_type, confidence, metadata, &self.limits)
    }

    /// Store a provenance record, evicting the least-recently-used entry if
    /// the store is at capacity.
    pub fn store(&self, provenance: Provenance) -> Result<(), ValidationError> {
        validate_provenance(&provenance, &self.limits)?;
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;
        let id = provenance.id;
        inner.entries.insert(id, StoreEntry { provenance, last_used: tick });

        if inner.entries.len() > self.limits.max_entries {
            if let Some(lru_id) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| *id)
            {
                inner.entries.remove(&lru_id);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: ProvenanceId) -> Option<Provenance> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let tick = inner.clock;
        let provenance = inner.entries.get(&id).map(|e| e.provenance.clone());
        if provenance.is_some() {
            if let Some(entry) = inner.entries.get_mut(&id) {
                entry.last_used = tick;
            }
        }
        provenance
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-validate and attach a provenance record to a memory, preventing
    /// bypass of `create_provenance`'s bounds via direct struct construction.
    pub fn attach_to_memory(&self, memory: &mut Memory, provenance: Provenance) -> Result<(), ValidationError> {
        validate_provenance(&provenance, &self.limits)?;
        self.store(provenance.clone())?;
        memory.provenance = Some(provenance);
        Ok(())
    }

    /// Record a retrieval event against a memory's ring buffer. Silently
    /// no-ops when the memory has no attached provenance, preventing orphan
    /// history entries.
    pub fn track_retrieval(&self, memory: &Memory, query: impl Into<String>, score: f32) {
        if memory.provenance.is_none() {
            return;
        }
        let mut inner = self.inner.lock();
        let ring = inner.retrieval_history.entry(memory.id).or_default();
        ring.push(RetrievalRecord {
            query: query.into(),
            score,
            at: chrono::Utc::now(),
        });
        let cap = self.limits.max_history_per_memory;
        if ring.len() > cap {
            let excess = ring.len() - cap;
            ring.drain(0..excess);
        }
    }

    pub fn retrieval_history_len(&self, memory_id: MemoryId) -> usize {
        self.inner
            .lock()
            .retrieval_history
            .get(&memory_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Snapshot of `(query, score, at)` for a memory's retrieval history,
    /// oldest first.
    pub fn retrieval_history(&self, memory_id: MemoryId) -> Vec<(String, f32, chrono::DateTime<chrono::Utc>)> {
        self.inner
            .lock()
            .retrieval_history
            .get(&memory_id)
            .map(|ring| ring.iter().map(|r| (r.query.clone(), r.score, r.at)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::{MemoryType, UserId};
    use serde_json::json;

    #[test]
    fn oversized_metadata_is_rejected_before_serialization() {
        let limits = ProvenanceLimits::default();
        let huge_value = "x".repeat(20_000);
        let result = create_provenance("s", "t", 0.9, Some(json!({ "data": huge_value })), &limits);
        assert!(result.is_err());
    }

    #[test]
    fn too_deep_metadata_is_rejected() {
        let limits = ProvenanceLimits {
            max_depth: 2,
            ..ProvenanceLimits::default()
        };
        let nested = json!({ "a": { "b": { "c": "too deep" } } });
        assert!(create_provenance("s", "t", 0.9, Some(nested), &limits).is_err());
    }

    #[test]
    fn attach_to_memory_cannot_bypass_validation() {
        let limits = ProvenanceLimits::default();
        let service = ProvenanceService::new(limits);
        let mut memory = Memory::new(UserId::now_v7(), "content", MemoryType::Fact, 0.9, "test");
        let bad = Provenance::new("x".repeat(500), "t", 0.9);
        assert!(service.attach_to_memory(&mut memory, bad).is_err());
    }

    #[test]
    fn track_retrieval_noops_without_provenance() {
        let service = ProvenanceService::new(ProvenanceLimits::default());
        let memory = Memory::new(UserId::now_v7(), "content", MemoryType::Fact, 0.9, "test");
        service.track_retrieval(&memory, "query", 0.9);
        assert_eq!(service.retrieval_history_len(memory.id), 0);
    }

    #[test]
    fn retrieval_history_is_bounded() {
        let limits = ProvenanceLimits {
            max_history_per_memory: 3,
            ..ProvenanceLimits::default()
        };
        let service = ProvenanceService::new(limits);
        let mut memory = Memory::new(UserId::now_v7(), "content", MemoryType::Fact, 0.9, "test");
        let provenance = service.create_provenance("s", "t", 0.9, None).unwrap();
        service.attach_to_memory(&mut memory, provenance).unwrap();

        for i in 0..5 {
            service.track_retrieval(&memory, format!("query {i}"), 0.5);
        }
        assert_eq!(service.retrieval_history_len(memory.id), 3);
    }

    #[test]
    fn store_evicts_lru_entry_at_capacity() {
        let limits = ProvenanceLimits {
            max_entries: 2,
            ..ProvenanceLimits::default()
        };
        let service = ProvenanceService::new(limits);
        let p1 = service.create_provenance("s1", "t", 0.9, None).unwrap();
        let id1 = p1.id;
        service.store(p1).unwrap();
        let p2 = service.create_provenance("s2", "t", 0.9, None).unwrap();
        service.store(p2).unwrap();
        let p3 = service.create_provenance("s3", "t", 0.9, None).unwrap();
        service.store(p3).unwrap();

        assert_eq!(service.len(), 2);
        assert!(service.get(id1).is_none());
    }
}
