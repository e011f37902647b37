//! MaaS agent identity (component R).

use crate::enums::{AgentType, Capability};
use crate::identity::{AgentId, EntityIdType, SessionId, Timestamp, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A registered principal in the multi-agent memory-sharing core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: AgentId,
    pub agent_type: AgentType,
    pub owner_id: UserId,
    pub capabilities: HashSet<Capability>,
    pub session_id: Option<SessionId>,
    pub metadata: Map<String, Value>,
    pub created_at: Timestamp,
}

impl AgentIdentity {
    /// Create an identity with the fixed default capability set for its type.
    pub fn new(id: AgentId, agent_type: AgentType, owner_id: UserId) -> Self {
        Self {
            id,
            agent_type,
            owner_id,
            capabilities: agent_type.default_capabilities().iter().copied().collect(),
            session_id: None,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_applied() {
        let agent = AgentIdentity::new(AgentId::now_v7(), AgentType::Human, UserId::now_v7());
        assert!(agent.has_capability(Capability::MemoryDelete));
        let pipeline =
            AgentIdentity::new(AgentId::now_v7(), AgentType::CustomPipeline, UserId::now_v7());
        assert!(!pipeline.has_capability(Capability::MemoryDelete));
        assert!(pipeline.has_capability(Capability::KbSearch));
    }
}
