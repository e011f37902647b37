//! Hindsight timeline event type (component Q).

use crate::enums::Network;
use crate::identity::{EventId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An immutable event in the hindsight timeline.
///
/// Events are append-only; supersession is modeled by `supersedes` pointing
/// at the event id it replaces, never by mutating the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEvent {
    pub id: EventId,
    pub content: String,
    pub timestamp: Timestamp,
    pub network: Network,
    pub entity_id: String,
    pub source: Option<String>,
    pub confidence: Option<f32>,
    pub supersedes: Option<EventId>,
    pub valid_from: Option<Timestamp>,
    pub valid_until: Option<Timestamp>,
    pub action_type: Option<String>,
    pub action_target: Option<String>,
    pub opinion_basis: Option<String>,
    pub metadata: Map<String, Value>,
}

impl TemporalEvent {
    /// Whether this event is the active state for its entity at `at`.
    pub fn covers(&self, at: Timestamp) -> bool {
        let after_start = self.valid_from.map(|vf| vf <= at).unwrap_or(true);
        let before_end = self.valid_until.map(|vu| vu > at).unwrap_or(true);
        after_start && before_end
    }
}
