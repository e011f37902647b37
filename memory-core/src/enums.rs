//! Enum types shared across the engine.

use serde::{Deserialize, Serialize};

/// Category of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Preference,
    Decision,
    Context,
}

/// One of the five context-assembly block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    System,
    Project,
    Task,
    History,
    Knowledge,
}

impl BlockType {
    /// Default priority, 1 is highest.
    pub fn default_priority(self) -> u8 {
        match self {
            BlockType::System => 1,
            BlockType::Project => 2,
            BlockType::Task => 3,
            BlockType::History => 4,
            BlockType::Knowledge => 5,
        }
    }

    /// Default token budget for this block kind.
    pub fn default_token_budget(self) -> u32 {
        match self {
            BlockType::System => 500,
            BlockType::Project => 1000,
            BlockType::Task => 500,
            BlockType::History => 1000,
            BlockType::Knowledge => 2000,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            BlockType::System => "SYSTEM",
            BlockType::Project => "PROJECT",
            BlockType::Task => "TASK",
            BlockType::History => "HISTORY",
            BlockType::Knowledge => "KNOWLEDGE",
        }
    }
}

/// Totally ordered visibility tier for shared content.
///
/// Ordering is derived from declaration order: `AgentPrivate < User < Project
/// < Team < Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedScope {
    AgentPrivate,
    User,
    Project,
    Team,
    Global,
}

impl SharedScope {
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Totally ordered permission level: `Read < Write < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionModel {
    Read,
    Write,
    Admin,
}

impl PermissionModel {
    /// True if `self` includes everything `required` grants (ADMIN ⊇ WRITE ⊇ READ).
    pub fn includes(self, required: PermissionModel) -> bool {
        self >= required
    }
}

/// Kind of agent principal registered in the MaaS core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    ClaudeCode,
    GptAgent,
    CustomPipeline,
    Human,
}

/// A single capability an agent may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    MemoryRead,
    MemoryWrite,
    MemoryDelete,
    KbSearch,
    DecisionRead,
    IncidentRead,
    HandoffInitiate,
    HandoffReceive,
}

impl AgentType {
    /// Fixed default capability set per agent type.
    pub fn default_capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            AgentType::ClaudeCode => &[
                MemoryRead,
                MemoryWrite,
                KbSearch,
                DecisionRead,
                HandoffInitiate,
                HandoffReceive,
            ],
            AgentType::GptAgent => &[MemoryRead, KbSearch, HandoffInitiate, HandoffReceive],
            AgentType::CustomPipeline => &[MemoryRead, KbSearch],
            AgentType::Human => &[
                MemoryRead,
                MemoryWrite,
                MemoryDelete,
                KbSearch,
                DecisionRead,
                IncidentRead,
                HandoffInitiate,
                HandoffReceive,
            ],
        }
    }
}

/// Lifecycle status of a shared memory pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Active,
    Archived,
}

/// Handoff finite-state-machine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Expired,
}

impl HandoffStatus {
    /// Whether `self -> next` is a legal FSM transition.
    pub fn can_transition_to(self, next: HandoffStatus) -> bool {
        use HandoffStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Pending, Expired) | (Accepted, Completed)
        )
    }
}

/// Typed relationship between two knowledge-graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    DependsOn,
    Uses,
    Implements,
    Calls,
    Configures,
    HadIncident,
    OwnedBy,
}

/// Temporal event network, per the hindsight timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    World,
    Bank,
    Opinion,
    Observation,
}
