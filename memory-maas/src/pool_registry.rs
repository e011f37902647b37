//! Singleton shared-memory pool registry (component R).

use crate::agent_registry::AgentRegistry;
use memory_core::{
    AgentId, EntityIdType, MaasError, MemoryId, PermissionModel, PoolId, PoolStatus, SharedMemoryEntry,
    SharedMemoryPool, SharedScope,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

static POOLS: Lazy<RwLock<HashMap<PoolId, SharedMemoryPool>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Process-wide pool registry.
pub struct PoolRegistry;

impl PoolRegistry {
    pub fn create_pool(pool: SharedMemoryPool) -> Result<(), MaasError> {
        let mut pools = POOLS.write();
        if pools.contains_key(&pool.id) {
            return Err(MaasError::DuplicatePool(pool.id));
        }
        pools.insert(pool.id, pool);
        Ok(())
    }

    /// Join `pool_id` as `agent_id` requesting `permission`. If the agent's
    /// owner is the pool's owner, the permission is silently upgraded to
    /// ADMIN regardless of what was requested. Returns `false` if the pool
    /// or agent is unknown.
    pub fn join_pool(pool_id: PoolId, agent_id: AgentId, permission: PermissionModel) -> bool {
        let Some(agent) = AgentRegistry::get_agent(agent_id) else {
            return false;
        };
        let mut pools = POOLS.write();
        let Some(pool) = pools.get_mut(&pool_id) else {
            return false;
        };
        let effective = if agent.owner_id == pool.owner_id {
            PermissionModel::Admin
        } else {
            permission
        };
        pool.members.insert(agent_id, effective);
        true
    }

    pub fn leave_pool(pool_id: PoolId, agent_id: AgentId) -> bool {
        let mut pools = POOLS.write();
        let Some(pool) = pools.get_mut(&pool_id) else {
            return false;
        };
        pool.members.remove(&agent_id).is_some()
    }

    /// `true` if `agent_id`'s granted permission includes `required`.
    pub fn check_access(pool_id: PoolId, agent_id: AgentId, required: PermissionModel) -> bool {
        let pools = POOLS.read();
        pools
            .get(&pool_id)
            .and_then(|p| p.members.get(&agent_id))
            .map(|granted| granted.includes(required))
            .unwrap_or(false)
    }

    /// Share a memory into the pool. Requires WRITE permission.
    pub fn share_memory(
        pool_id: PoolId,
        agent_id: AgentId,
        memory_id: MemoryId,
        scope: SharedScope,
    ) -> Result<bool, MaasError> {
        if !Self::check_access(pool_id, agent_id, PermissionModel::Write) {
            warn!(%agent_id, pool = %pool_id, "share_memory denied: insufficient permission");
            return Ok(false);
        }
        let mut pools = POOLS.write();
        let Some(pool) = pools.get_mut(&pool_id) else {
            return Ok(false);
        };
        pool.share(memory_id, agent_id, scope);
        Ok(true)
    }

    /// Memories shared with scope `<= max_scope`, visible only to members.
    pub fn query_shared(pool_id: PoolId, agent_id: AgentId, max_scope: SharedScope) -> Vec<SharedMemoryEntry> {
        let pools = POOLS.read();
        let Some(pool) = pools.get(&pool_id) else {
            return Vec::new();
        };
        if !pool.members.contains_key(&agent_id) {
            return Vec::new();
        }
        pool.query_shared(max_scope).into_iter().cloned().collect()
    }

    pub fn archive_pool(pool_id: PoolId) -> bool {
        let mut pools = POOLS.write();
        let Some(pool) = pools.get_mut(&pool_id) else {
            return false;
        };
        pool.status = PoolStatus::Archived;
        true
    }

    pub fn delete_pool(pool_id: PoolId) -> bool {
        POOLS.write().remove(&pool_id).is_some()
    }

    pub fn get_pool(pool_id: PoolId) -> Option<SharedMemoryPool> {
        POOLS.read().get(&pool_id).cloned()
    }

    /// Clear all state. Test-only.
    pub fn reset_for_test() {
        POOLS.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_registry::AgentRegistry;
    use memory_core::{AgentIdentity, AgentType, UserId};

    fn pool(owner: UserId) -> SharedMemoryPool {
        SharedMemoryPool::new(PoolId::now_v7(), "p", owner, SharedScope::Project)
    }

    #[test]
    fn owner_of_agent_is_silently_upgraded_to_admin() {
        AgentRegistry::reset_for_test();
        PoolRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let agent = AgentIdentity::new(AgentId::now_v7(), AgentType::Human, owner);
        let agent_id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();

        let p = pool(owner);
        let pool_id = p.id;
        PoolRegistry::create_pool(p).unwrap();

        assert!(PoolRegistry::join_pool(pool_id, agent_id, PermissionModel::Read));
        assert!(PoolRegistry::check_access(pool_id, agent_id, PermissionModel::Admin));
    }

    #[test]
    fn non_owner_keeps_requested_permission() {
        AgentRegistry::reset_for_test();
        PoolRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let other = UserId::now_v7();
        let agent = AgentIdentity::new(AgentId::now_v7(), AgentType::Human, other);
        let agent_id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();

        let p = pool(owner);
        let pool_id = p.id;
        PoolRegistry::create_pool(p).unwrap();

        assert!(PoolRegistry::join_pool(pool_id, agent_id, PermissionModel::Read));
        assert!(!PoolRegistry::check_access(pool_id, agent_id, PermissionModel::Write));
    }

    #[test]
    fn share_memory_requires_write_permission() {
        AgentRegistry::reset_for_test();
        PoolRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let other = UserId::now_v7();
        let agent = AgentIdentity::new(AgentId::now_v7(), AgentType::Human, other);
        let agent_id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();

        let p = pool(owner);
        let pool_id = p.id;
        PoolRegistry::create_pool(p).unwrap();
        PoolRegistry::join_pool(pool_id, agent_id, PermissionModel::Read);

        let result = PoolRegistry::share_memory(pool_id, agent_id, MemoryId::now_v7(), SharedScope::User);
        assert_eq!(result.unwrap(), false);
    }

    #[test]
    fn query_shared_filters_by_scope_and_membership() {
        AgentRegistry::reset_for_test();
        PoolRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let agent = AgentIdentity::new(AgentId::now_v7(), AgentType::Human, owner);
        let agent_id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();

        let p = pool(owner);
        let pool_id = p.id;
        PoolRegistry::create_pool(p).unwrap();
        PoolRegistry::join_pool(pool_id, agent_id, PermissionModel::Write);
        PoolRegistry::share_memory(pool_id, agent_id, MemoryId::now_v7(), SharedScope::User).unwrap();
        PoolRegistry::share_memory(pool_id, agent_id, MemoryId::now_v7(), SharedScope::Team).unwrap();

        assert_eq!(PoolRegistry::query_shared(pool_id, agent_id, SharedScope::User).len(), 1);
        assert_eq!(PoolRegistry::query_shared(pool_id, agent_id, SharedScope::Global).len(), 2);

        let stranger = AgentId::now_v7();
        assert!(PoolRegistry::query_shared(pool_id, stranger, SharedScope::Global).is_empty());
    }
}
