//! Singleton agent identity and session registry (component R).

use memory_core::{AgentId, AgentIdentity, EntityIdType, MaasError, SessionId, UserId};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct State {
    agents: HashMap<AgentId, AgentIdentity>,
    deactivated: HashSet<AgentId>,
    sessions: HashMap<SessionId, AgentId>,
}

static STATE: Lazy<RwLock<State>> = Lazy::new(|| RwLock::new(State::default()));

/// Process-wide agent registry. All operations acquire the shared lock
/// internally; there is no re-entrant call path (no method calls another
/// method of this registry while holding the lock), so a plain `RwLock`
/// suffices.
pub struct AgentRegistry;

impl AgentRegistry {
    /// Register a new agent identity. Fails if the id is already registered.
    pub fn register_agent(identity: AgentIdentity) -> Result<(), MaasError> {
        let mut state = STATE.write();
        if state.agents.contains_key(&identity.id) {
            return Err(MaasError::DuplicateAgent(identity.id));
        }
        state.agents.insert(identity.id, identity);
        Ok(())
    }

    /// Defensive copy of the stored identity.
    pub fn get_agent(id: AgentId) -> Option<AgentIdentity> {
        STATE.read().agents.get(&id).cloned()
    }

    pub fn get_agents_by_owner(owner: UserId) -> Vec<AgentIdentity> {
        STATE
            .read()
            .agents
            .values()
            .filter(|a| a.owner_id == owner)
            .cloned()
            .collect()
    }

    pub fn get_active_agents() -> Vec<AgentIdentity> {
        let state = STATE.read();
        state
            .agents
            .values()
            .filter(|a| !state.deactivated.contains(&a.id))
            .cloned()
            .collect()
    }

    /// Returns `false` if the agent is unknown.
    pub fn deactivate_agent(id: AgentId) -> bool {
        let mut state = STATE.write();
        if !state.agents.contains_key(&id) {
            return false;
        }
        state.deactivated.insert(id);
        true
    }

    pub fn is_agent_active(id: AgentId) -> bool {
        let state = STATE.read();
        state.agents.contains_key(&id) && !state.deactivated.contains(&id)
    }

    /// Start a session for `agent_id`, returning its new session id. `None`
    /// if the agent is unknown or inactive.
    pub fn start_session(agent_id: AgentId) -> Option<SessionId> {
        let mut state = STATE.write();
        if !state.agents.contains_key(&agent_id) || state.deactivated.contains(&agent_id) {
            return None;
        }
        let session_id = SessionId::now_v7();
        state.sessions.insert(session_id, agent_id);
        if let Some(agent) = state.agents.get_mut(&agent_id) {
            agent.session_id = Some(session_id);
        }
        Some(session_id)
    }

    pub fn end_session(session_id: SessionId) {
        let mut state = STATE.write();
        if let Some(agent_id) = state.sessions.remove(&session_id) {
            if let Some(agent) = state.agents.get_mut(&agent_id) {
                if agent.session_id == Some(session_id) {
                    agent.session_id = None;
                }
            }
        }
    }

    pub fn get_session(session_id: SessionId) -> Option<AgentId> {
        STATE.read().sessions.get(&session_id).copied()
    }

    /// Clear all state. Test-only.
    pub fn reset_for_test() {
        *STATE.write() = State::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::{AgentId, AgentType};

    fn identity(owner: UserId) -> AgentIdentity {
        AgentIdentity::new(AgentId::now_v7(), AgentType::ClaudeCode, owner)
    }

    #[test]
    fn duplicate_registration_fails() {
        AgentRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let mut agent = identity(owner);
        agent.id = AgentId::now_v7();
        let dup = agent.clone();
        AgentRegistry::register_agent(agent).unwrap();
        assert!(AgentRegistry::register_agent(dup).is_err());
    }

    #[test]
    fn deactivate_removes_from_active_set() {
        AgentRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let agent = identity(owner);
        let id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();
        assert!(AgentRegistry::is_agent_active(id));
        assert!(AgentRegistry::deactivate_agent(id));
        assert!(!AgentRegistry::is_agent_active(id));
        assert!(AgentRegistry::get_active_agents().iter().all(|a| a.id != id));
    }

    #[test]
    fn session_lifecycle() {
        AgentRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let agent = identity(owner);
        let id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();

        let session = AgentRegistry::start_session(id).unwrap();
        assert_eq!(AgentRegistry::get_session(session), Some(id));
        AgentRegistry::end_session(session);
        assert_eq!(AgentRegistry::get_session(session), None);
    }

    #[test]
    fn inactive_agent_cannot_start_session() {
        AgentRegistry::reset_for_test();
        let owner = UserId::now_v7();
        let agent = identity(owner);
        let id = agent.id;
        AgentRegistry::register_agent(agent).unwrap();
        AgentRegistry::deactivate_agent(id);
        assert!(AgentRegistry::start_session(id).is_none());
    }
}
