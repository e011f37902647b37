//! Memory Engine Hindsight Timeline - an append-only event store with
//! entity/network/time indexes and natural-language temporal search.
//!
//! Component Q.

pub mod search;
pub mod store;

pub use search::{parse_temporal_reference, resolve_range, ParsedReference, ScoredEvent, TemporalRange, TemporalSearch};
pub use store::{TemporalEvent, TemporalEventStore};
