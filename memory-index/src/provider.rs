//! Memory provider: CRUD plus delegated retrieval (component A).

use async_trait::async_trait;
use memory_core::{EntityIdType, Memory, MemoryId, MemoryType, StorageError, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::RetrievalCache;

/// Filters accepted by [`MemoryProvider::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub memory_type: Option<MemoryType>,
    pub source: Option<String>,
    pub min_confidence: Option<f32>,
    pub include_invalid: bool,
}

/// Fields that may be changed by [`MemoryProvider::update`]. `None` means
/// "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub confidence: Option<f32>,
    pub metadata_patch: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Delegate a provider attaches to get two-stage hybrid retrieval. Defined
/// here (rather than depending on `memory-retrieval` directly) so the
/// dependency arrow points the expected way: retrieval depends on indexing,
/// not the reverse.
#[async_trait]
pub trait HybridDelegate: Send + Sync {
    async fn retrieve_delegate(
        &self,
        query: &str,
        user_id: UserId,
        limit: usize,
    ) -> Vec<(Memory, f32)>;

    fn has_index(&self, user_id: UserId) -> bool;

    fn index_memory(&self, memory: &Memory);

    fn remove_from_index(&self, user_id: UserId, memory_id: MemoryId);
}

/// Async CRUD contract for memory storage (component A / §6).
#[async_trait]
pub trait MemoryProvider: Send + Sync {
    async fn store(&self, memory: Memory) -> Result<MemoryId, StorageError>;

    async fn retrieve(&self, query: &str, user_id: UserId, limit: usize) -> Vec<Memory>;

    async fn get_by_id(&self, id: MemoryId) -> Option<Memory>;

    async fn delete(&self, id: MemoryId) -> bool;

    async fn search(&self, user_id: UserId, filters: SearchFilters, limit: usize) -> Vec<Memory>;

    async fn update(&self, id: MemoryId, update: MemoryUpdate) -> Result<(), StorageError>;
}

/// In-process, per-user bounded memory store. The reference implementation
/// of [`MemoryProvider`]; real deployments swap this for a column-store
/// backed equivalent behind the same trait.
pub struct InMemoryMemoryProvider {
    memories: RwLock<HashMap<MemoryId, Memory>>,
    by_user: RwLock<HashMap<UserId, Vec<MemoryId>>>,
    hybrid: Option<Arc<dyn HybridDelegate>>,
    cache: Option<Arc<RetrievalCache>>,
    max_per_user: usize,
}

impl InMemoryMemoryProvider {
    pub fn new(max_per_user: usize) -> Self {
        Self {
            memories: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
            hybrid: None,
            cache: None,
            max_per_user,
        }
    }

    pub fn with_hybrid(mut self, hybrid: Arc<dyn HybridDelegate>) -> Self {
        self.hybrid = Some(hybrid);
        self
    }

    pub fn with_cache(mut self, cache: Arc<RetrievalCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn substring_retrieve(&self, query: &str, user_id: UserId, limit: usize) -> Vec<Memory> {
        let needle = query.to_lowercase();
        let memories = self.memories.read();
        let by_user = self.by_user.read();
        let Some(ids) = by_user.get(&user_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| memories.get(id))
            .filter(|m| !m.is_hidden() && m.content.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryMemoryProvider {
    async fn store(&self, memory: Memory) -> Result<MemoryId, StorageError> {
        let id = memory.id;
        let user_id = memory.user_id;

        {
            let mut by_user = self.by_user.write();
            let ids = by_user.entry(user_id).or_default();
            ids.push(id);
            if ids.len() > self.max_per_user {
                let evicted = ids.remove(0);
                self.memories.write().remove(&evicted);
            }
        }

        if let Some(hybrid) = &self.hybrid {
            hybrid.index_memory(&memory);
        }
        self.memories.write().insert(id, memory);

        if let Some(cache) = &self.cache {
            cache.invalidate_user(user_id);
        }
        Ok(id)
    }

    async fn retrieve(&self, query: &str, user_id: UserId, limit: usize) -> Vec<Memory> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(user_id, query, limit) {
                return hit;
            }
        }

        let result = if let Some(hybrid) = &self.hybrid {
            if hybrid.has_index(user_id) {
                hybrid
                    .retrieve_delegate(query, user_id, limit)
                    .await
                    .into_iter()
                    .map(|(m, _)| m)
                    .collect()
            } else {
                self.substring_retrieve(query, user_id, limit)
            }
        } else {
            self.substring_retrieve(query, user_id, limit)
        };

        if let Some(cache) = &self.cache {
            cache.put(user_id, query, limit, result.clone());
        }
        result
    }

    async fn get_by_id(&self, id: MemoryId) -> Option<Memory> {
        self.memories.read().get(&id).cloned()
    }

    async fn delete(&self, id: MemoryId) -> bool {
        let removed = self.memories.write().remove(&id);
        let Some(memory) = removed else {
            return false;
        };
        if let Some(ids) = self.by_user.write().get_mut(&memory.user_id) {
            ids.retain(|existing| *existing != id);
        }
        if let Some(hybrid) = &self.hybrid {
            hybrid.remove_from_index(memory.user_id, id);
        }
        if let Some(cache) = &self.cache {
            cache.invalidate_user(memory.user_id);
        }
        true
    }

    async fn search(&self, user_id: UserId, filters: SearchFilters, limit: usize) -> Vec<Memory> {
        let memories = self.memories.read();
        let by_user = self.by_user.read();
        let Some(ids) = by_user.get(&user_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| memories.get(id))
            .filter(|m| filters.include_invalid || !m.is_hidden())
            .filter(|m| filters.memory_type.map_or(true, |t| m.memory_type == t))
            .filter(|m| filters.source.as_ref().map_or(true, |s| &m.source == s))
            .filter(|m| filters.min_confidence.map_or(true, |c| m.confidence >= c))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn update(&self, id: MemoryId, update: MemoryUpdate) -> Result<(), StorageError> {
        let mut memories = self.memories.write();
        let memory = memories
            .get_mut(&id)
            .ok_or(StorageError::NotFound(id))?;

        if let Some(content) = update.content {
            memory.content = content;
        }
        if let Some(confidence) = update.confidence {
            memory.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(patch) = update.metadata_patch {
            for (k, v) in patch {
                memory.metadata.insert(k, v);
            }
        }
        memory.record_update("update");

        let user_id = memory.user_id;
        drop(memories);
        if let Some(cache) = &self.cache {
            cache.invalidate_user(user_id);
        }
        Ok(())
    }
}
