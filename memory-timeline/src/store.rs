//! Append-only temporal event store with entity/network/time indexes
//! (component Q).

use memory_core::{EntityIdType, EventId, Network, Timestamp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;

pub use memory_core::TemporalEvent;

#[derive(Default)]
struct Indexes {
    events: HashMap<EventId, TemporalEvent>,
    by_entity: HashMap<String, Vec<EventId>>,
    by_network: HashMap<Network, Vec<EventId>>,
    by_time: BTreeMap<Timestamp, Vec<EventId>>,
}

/// Events are immutable after insertion; the only way to "change" one is to
/// insert a new event whose `supersedes` points at the old id, forming a
/// chain rather than mutating history in place.
#[derive(Default)]
pub struct TemporalEventStore {
    inner: RwLock<Indexes>,
}

impl TemporalEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: TemporalEvent) -> EventId {
        let mut inner = self.inner.write();
        let id = event.id;
        inner.by_entity.entry(event.entity_id.clone()).or_default().push(id);
        inner.by_network.entry(event.network).or_default().push(id);
        inner.by_time.entry(event.timestamp).or_default().push(id);
        inner.events.insert(id, event);
        id
    }

    pub fn get(&self, id: EventId) -> Option<TemporalEvent> {
        self.inner.read().events.get(&id).cloned()
    }

    pub fn by_entity(&self, entity_id: &str) -> Vec<TemporalEvent> {
        let inner = self.inner.read();
        inner
            .by_entity
            .get(entity_id)
            .map(|ids| ids.iter().filter_map(|id| inner.events.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn by_network(&self, network: Network) -> Vec<TemporalEvent> {
        let inner = self.inner.read();
        inner
            .by_network
            .get(&network)
            .map(|ids| ids.iter().filter_map(|id| inner.events.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn in_time_range(&self, start: Timestamp, end: Timestamp) -> Vec<TemporalEvent> {
        let inner = self.inner.read();
        inner
            .by_time
            .range(start..=end)
            .flat_map(|(_, ids)| ids.iter().filter_map(|id| inner.events.get(id).cloned()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The latest event for `entity_id` whose validity window covers
    /// `at_time`: `valid_from <= at_time` and, if set, `valid_until >
    /// at_time`. Ties broken by the later `timestamp`.
    pub fn get_entity_state_at(&self, entity_id: &str, at_time: Timestamp) -> Option<TemporalEvent> {
        self.by_entity(entity_id)
            .into_iter()
            .filter(|e| e.covers(at_time))
            .max_by_key(|e| e.valid_from.unwrap_or(e.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn event(entity: &str, network: Network, timestamp: Timestamp) -> TemporalEvent {
        TemporalEvent {
            id: EventId::now_v7(),
            content: format!("{entity} event"),
            timestamp,
            network,
            entity_id: entity.to_string(),
            source: None,
            confidence: None,
            supersedes: None,
            valid_from: Some(timestamp),
            valid_until: None,
            action_type: None,
            action_target: None,
            opinion_basis: None,
            metadata: Map::new(),
        }
    }

    #[test]
    fn indexes_are_populated_on_insert() {
        let store = TemporalEventStore::new();
        let now = chrono::Utc::now();
        store.insert(event("incident-1", Network::World, now));
        assert_eq!(store.by_entity("incident-1").len(), 1);
        assert_eq!(store.by_network(Network::World).len(), 1);
        assert_eq!(store.in_time_range(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1)).len(), 1);
    }

    #[test]
    fn entity_state_at_picks_latest_covering_event() {
        let store = TemporalEventStore::new();
        let t0 = chrono::Utc::now() - chrono::Duration::days(2);
        let t1 = chrono::Utc::now() - chrono::Duration::days(1);

        let mut first = event("service-a", Network::World, t0);
        first.valid_until = Some(t1);
        let second = event("service-a", Network::World, t1);

        store.insert(first);
        store.insert(second.clone());

        let state = store.get_entity_state_at("service-a", chrono::Utc::now()).unwrap();
        assert_eq!(state.id, second.id);
    }

    #[test]
    fn entity_state_at_returns_none_outside_any_window() {
        let store = TemporalEventStore::new();
        let t0 = chrono::Utc::now();
        let mut e = event("service-b", Network::World, t0);
        e.valid_until = Some(t0 + chrono::Duration::hours(1));
        store.insert(e);

        let far_future = t0 + chrono::Duration::days(30);
        assert!(store.get_entity_state_at("service-b", far_future).is_none());
    }
}
