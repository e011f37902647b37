//! Agent task handoffs (component R).

use crate::enums::HandoffStatus;
use crate::identity::{AgentId, HandoffId, MemoryId, Timestamp};
use serde::{Deserialize, Serialize};

/// Context carried with a handoff from source to target agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffContext {
    pub task_description: String,
    pub current_state: serde_json::Value,
    pub relevant_memories: Vec<MemoryId>,
    pub relevant_files: Vec<String>,
}

/// A single agent-to-agent task transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: HandoffId,
    pub source_agent_id: AgentId,
    pub target_agent_id: AgentId,
    pub context: HandoffContext,
    pub status: HandoffStatus,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub accepted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl Handoff {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}
