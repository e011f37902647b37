//! Shared memory pools (component R).

use crate::enums::{PermissionModel, PoolStatus, SharedScope};
use crate::identity::{AgentId, EntityIdType, MemoryId, PoolId, Timestamp, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One memory shared into a pool by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMemoryEntry {
    pub memory_id: MemoryId,
    pub sharing_agent_id: AgentId,
    pub scope: SharedScope,
    pub shared_at: Timestamp,
}

/// A permissioned, scope-bound pool of shared memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedMemoryPool {
    pub id: PoolId,
    pub name: String,
    pub owner_id: UserId,
    pub scope: SharedScope,
    pub status: PoolStatus,
    pub members: HashMap<AgentId, PermissionModel>,
    pub shared_memories: Vec<SharedMemoryEntry>,
}

impl SharedMemoryPool {
    pub fn new(id: PoolId, name: impl Into<String>, owner_id: UserId, scope: SharedScope) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id,
            scope,
            status: PoolStatus::Active,
            members: HashMap::new(),
            shared_memories: Vec::new(),
        }
    }

    pub fn share(
        &mut self,
        memory_id: MemoryId,
        sharing_agent_id: AgentId,
        scope: SharedScope,
    ) {
        self.shared_memories.push(SharedMemoryEntry {
            memory_id,
            sharing_agent_id,
            scope,
            shared_at: Utc::now(),
        });
    }

    pub fn query_shared(&self, max_scope: SharedScope) -> Vec<&SharedMemoryEntry> {
        self.shared_memories
            .iter()
            .filter(|e| e.scope <= max_scope)
            .collect()
    }
}
