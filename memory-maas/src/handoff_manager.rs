//! Singleton agent handoff state machine (component R).

use crate::agent_registry::AgentRegistry;
use crate::security::MaaSAuditLogger;
use memory_core::{
    AgentId, Capability, EntityIdType, Handoff, HandoffContext, HandoffId, HandoffStatus, MaasError, MaasLimits,
    Timestamp,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

#[derive(Default)]
struct State {
    handoffs: HashMap<HandoffId, Handoff>,
    pending_per_target: HashMap<AgentId, usize>,
}

static STATE: Lazy<RwLock<State>> = Lazy::new(|| RwLock::new(State::default()));

/// Process-wide handoff state machine, enforcing the strict
/// `HandoffStatus::can_transition_to` FSM and per-target/total capacity caps.
pub struct HandoffManager {
    limits: MaasLimits,
}

impl Default for HandoffManager {
    fn default() -> Self {
        Self {
            limits: MaasLimits::default(),
        }
    }
}

impl HandoffManager {
    pub fn new(limits: MaasLimits) -> Self {
        Self { limits }
    }

    /// Validate capabilities and capacity, then create a PENDING handoff.
    /// Returns `None` (and logs a denial via `audit` if provided) on any
    /// validation failure rather than raising.
    pub fn initiate_handoff(
        &self,
        source: AgentId,
        target: AgentId,
        context: HandoffContext,
        ttl: Option<chrono::Duration>,
        audit: Option<&MaaSAuditLogger>,
    ) -> Result<Option<Handoff>, MaasError> {
        let Some(source_identity) = AgentRegistry::get_agent(source) else {
            Self::deny(audit, source, "unknown source agent");
            return Ok(None);
        };
        let Some(target_identity) = AgentRegistry::get_agent(target) else {
            Self::deny(audit, source, "unknown target agent");
            return Ok(None);
        };
        if !source_identity.has_capability(Capability::HandoffInitiate) {
            Self::deny(audit, source, "source lacks HANDOFF_INITIATE");
            return Ok(None);
        }
        if !target_identity.has_capability(Capability::HandoffReceive) {
            Self::deny(audit, source, "target lacks HANDOFF_RECEIVE");
            return Ok(None);
        }

        let mut state = STATE.write();
        if state.handoffs.len() >= self.limits.max_handoffs {
            return Err(MaasError::CapacityExceeded {
                reason: format!("max_handoffs ({}) reached", self.limits.max_handoffs),
            });
        }
        let pending = state.pending_per_target.entry(target).or_insert(0);
        if *pending >= self.limits.max_pending_per_target {
            return Err(MaasError::CapacityExceeded {
                reason: format!("max_pending_per_target ({}) reached for target", self.limits.max_pending_per_target),
            });
        }
        *pending += 1;

        let now = chrono::Utc::now();
        let handoff = Handoff {
            id: HandoffId::now_v7(),
            source_agent_id: source,
            target_agent_id: target,
            context,
            status: HandoffStatus::Pending,
            created_at: now,
            expires_at: ttl.map(|d| now + d),
            accepted_at: None,
            completed_at: None,
            rejection_reason: None,
            result: None,
        };
        state.handoffs.insert(handoff.id, handoff.clone());
        if let Some(audit) = audit {
            audit.log_agent_operation(source, "initiate_handoff");
        }
        Ok(Some(handoff))
    }

    fn deny(audit: Option<&MaaSAuditLogger>, agent: AgentId, reason: &str) {
        warn!(%agent, reason, "handoff initiation denied");
        if let Some(audit) = audit {
            audit.log_permission_denied(agent, reason);
        }
    }

    fn transition(
        &self,
        handoff_id: HandoffId,
        caller: AgentId,
        next: HandoffStatus,
        audit: Option<&MaaSAuditLogger>,
        apply: impl FnOnce(&mut Handoff),
    ) -> Result<bool, MaasError> {
        let mut state = STATE.write();
        let handoff = state
            .handoffs
            .get_mut(&handoff_id)
            .ok_or(MaasError::UnknownHandoff(handoff_id))?;

        if handoff.target_agent_id != caller {
            warn!(%caller, handoff = %handoff_id, "handoff transition denied: caller is not the target");
            if let Some(audit) = audit {
                audit.log_permission_denied(caller, "not the handoff target");
            }
            return Ok(false);
        }
        if !handoff.status.can_transition_to(next) {
            return Ok(false);
        }
        apply(handoff);
        handoff.status = next;
        if let Some(target) = state.pending_per_target.get_mut(&handoff.target_agent_id) {
            if matches!(next, HandoffStatus::Accepted | HandoffStatus::Rejected | HandoffStatus::Expired) {
                *target = target.saturating_sub(1);
            }
        }
        Ok(true)
    }

    pub fn accept_handoff(&self, handoff_id: HandoffId, caller: AgentId, audit: Option<&MaaSAuditLogger>) -> Result<bool, MaasError> {
        self.transition(handoff_id, caller, HandoffStatus::Accepted, audit, |h| {
            h.accepted_at = Some(chrono::Utc::now());
        })
    }

    pub fn reject_handoff(
        &self,
        handoff_id: HandoffId,
        caller: AgentId,
        reason: String,
        audit: Option<&MaaSAuditLogger>,
    ) -> Result<bool, MaasError> {
        self.transition(handoff_id, caller, HandoffStatus::Rejected, audit, |h| {
            h.rejection_reason = Some(reason);
        })
    }

    pub fn complete_handoff(
        &self,
        handoff_id: HandoffId,
        caller: AgentId,
        result: serde_json::Value,
        audit: Option<&MaaSAuditLogger>,
    ) -> Result<bool, MaasError> {
        self.transition(handoff_id, caller, HandoffStatus::Completed, audit, |h| {
            h.completed_at = Some(chrono::Utc::now());
            h.result = Some(result);
        })
    }

    /// Scan PENDING handoffs past their `expires_at` and transition them.
    /// Returns the number expired.
    pub fn expire_old_handoffs(&self, now: Timestamp) -> usize {
        let mut state = STATE.write();
        let mut expired = 0;
        let to_expire: Vec<HandoffId> = state
            .handoffs
            .values()
            .filter(|h| h.status == HandoffStatus::Pending && h.is_expired_at(now))
            .map(|h| h.id)
            .collect();
        for id in to_expire {
            if let Some(h) = state.handoffs.get_mut(&id) {
                h.status = HandoffStatus::Expired;
                if let Some(pending) = state.pending_per_target.get_mut(&h.target_agent_id) {
                    *pending = pending.saturating_sub(1);
                }
                expired += 1;
            }
        }
        expired
    }

    pub fn get_handoff(handoff_id: HandoffId) -> Option<Handoff> {
        STATE.read().handoffs.get(&handoff_id).cloned()
    }

    /// Clear all state. Test-only.
    pub fn reset_for_test() {
        *STATE.write() = State::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::{AgentIdentity, AgentType, UserId};

    fn agent_with(capability_set: AgentType, owner: UserId) -> AgentIdentity {
        AgentIdentity::new(AgentId::now_v7(), capability_set, owner)
    }

    fn ctx() -> HandoffContext {
        HandoffContext {
            task_description: "do the thing".into(),
            current_state: serde_json::json!({}),
            relevant_memories: vec![],
            relevant_files: vec![],
        }
    }

    #[test]
    fn only_target_may_accept() {
        AgentRegistry::reset_for_test();
        HandoffManager::reset_for_test();
        let owner = UserId::now_v7();
        let source = agent_with(AgentType::ClaudeCode, owner);
        let target = agent_with(AgentType::ClaudeCode, owner);
        let (source_id, target_id) = (source.id, target.id);
        AgentRegistry::register_agent(source).unwrap();
        AgentRegistry::register_agent(target).unwrap();

        let manager = HandoffManager::default();
        let handoff = manager
            .initiate_handoff(source_id, target_id, ctx(), None, None)
            .unwrap()
            .unwrap();

        assert_eq!(manager.accept_handoff(handoff.id, source_id, None).unwrap(), false);
        assert!(manager.accept_handoff(handoff.id, target_id, None).unwrap());
    }

    #[test]
    fn fsm_rejects_illegal_transitions() {
        AgentRegistry::reset_for_test();
        HandoffManager::reset_for_test();
        let owner = UserId::now_v7();
        let source = agent_with(AgentType::ClaudeCode, owner);
        let target = agent_with(AgentType::ClaudeCode, owner);
        let (source_id, target_id) = (source.id, target.id);
        AgentRegistry::register_agent(source).unwrap();
        AgentRegistry::register_agent(target).unwrap();

        let manager = HandoffManager::default();
        let handoff = manager
            .initiate_handoff(source_id, target_id, ctx(), None, None)
            .unwrap()
            .unwrap();

        assert!(manager
            .complete_handoff(handoff.id, target_id, serde_json::json!({}), None)
            .unwrap()
            == false);
    }

    #[test]
    fn missing_capability_denies_initiation() {
        AgentRegistry::reset_for_test();
        HandoffManager::reset_for_test();
        let owner = UserId::now_v7();
        let source = agent_with(AgentType::CustomPipeline, owner);
        let target = agent_with(AgentType::ClaudeCode, owner);
        let (source_id, target_id) = (source.id, target.id);
        AgentRegistry::register_agent(source).unwrap();
        AgentRegistry::register_agent(target).unwrap();

        let manager = HandoffManager::default();
        let result = manager.initiate_handoff(source_id, target_id, ctx(), None, None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn expire_old_handoffs_transitions_pending_past_ttl() {
        AgentRegistry::reset_for_test();
        HandoffManager::reset_for_test();
        let owner = UserId::now_v7();
        let source = agent_with(AgentType::ClaudeCode, owner);
        let target = agent_with(AgentType::ClaudeCode, owner);
        let (source_id, target_id) = (source.id, target.id);
        AgentRegistry::register_agent(source).unwrap();
        AgentRegistry::register_agent(target).unwrap();

        let manager = HandoffManager::default();
        let handoff = manager
            .initiate_handoff(source_id, target_id, ctx(), Some(chrono::Duration::seconds(-1)), None)
            .unwrap()
            .unwrap();

        let expired = manager.expire_old_handoffs(chrono::Utc::now());
        assert_eq!(expired, 1);
        assert_eq!(HandoffManager::get_handoff(handoff.id).unwrap().status, HandoffStatus::Expired);
    }
}
