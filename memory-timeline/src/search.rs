//! Natural-language temporal search over a `TemporalEventStore`.

use crate::store::TemporalEventStore;
use memory_core::{EntityIdType, Network, TemporalEvent, Timestamp};
use once_cell::sync::Lazy;
use regex::Regex;

static LAST_N_DAYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)last\s+(\d+)\s+days?").unwrap());
static LAST_N_WEEKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)last\s+(\d+)\s+weeks?").unwrap());
static QUARTER_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)q([1-4])\s+(\d{4})").unwrap());
static BEFORE_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)before\s+([\w-]+)").unwrap());
static AFTER_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)after\s+([\w-]+)").unwrap());

/// A parsed temporal range, resolved against a concrete `now` and, for
/// relative-to-entity references ("before incident-123"), an anchor
/// timestamp looked up in the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// What `parse_temporal_reference` extracted from a free-text query,
/// before being resolved into a concrete `TemporalRange`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReference {
    LastNDays(i64),
    Quarter { quarter: u32, year: i32 },
    BeforeEntity(String),
    AfterEntity(String),
}

/// Parse the first recognized temporal reference in `text`. Recognizes
/// "last N days", "last N weeks", "Q<n> <year>", "before <entity>", and
/// "after <entity>". Returns `None` if nothing matches.
pub fn parse_temporal_reference(text: &str) -> Option<ParsedReference> {
    if let Some(caps) = LAST_N_DAYS.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        return Some(ParsedReference::LastNDays(n));
    }
    if let Some(caps) = LAST_N_WEEKS.captures(text) {
        let n: i64 = caps[1].parse().ok()?;
        return Some(ParsedReference::LastNDays(n * 7));
    }
    if let Some(caps) = QUARTER_YEAR.captures(text) {
        let quarter: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return Some(ParsedReference::Quarter { quarter, year });
    }
    if let Some(caps) = BEFORE_ENTITY.captures(text) {
        return Some(ParsedReference::BeforeEntity(caps[1].to_string()));
    }
    if let Some(caps) = AFTER_ENTITY.captures(text) {
        return Some(ParsedReference::AfterEntity(caps[1].to_string()));
    }
    None
}

fn quarter_bounds(quarter: u32, year: i32) -> Option<(Timestamp, Timestamp)> {
    use chrono::TimeZone;
    let start_month = match quarter {
        1 => 1,
        2 => 4,
        3 => 7,
        4 => 10,
        _ => return None,
    };
    let (end_year, end_month) = if start_month + 3 > 12 { (year + 1, 1) } else { (year, start_month + 3) };
    let start = chrono::Utc.with_ymd_and_hms(year, start_month, 1, 0, 0, 0).single()?;
    let end = chrono::Utc.with_ymd_and_hms(end_year, end_month, 1, 0, 0, 0).single()?;
    Some((start, end))
}

/// Resolve a parsed reference into a concrete range. `now` anchors
/// relative references; `store` resolves entity-anchored references
/// ("before incident-123") against that entity's earliest/latest events.
pub fn resolve_range(parsed: &ParsedReference, now: Timestamp, store: &TemporalEventStore) -> Option<TemporalRange> {
    match parsed {
        ParsedReference::LastNDays(n) => Some(TemporalRange { start: now - chrono::Duration::days(*n), end: now }),
        ParsedReference::Quarter { quarter, year } => {
            let (start, end) = quarter_bounds(*quarter, *year)?;
            Some(TemporalRange { start, end })
        }
        ParsedReference::BeforeEntity(entity) => {
            let anchor = store.by_entity(entity).into_iter().map(|e| e.timestamp).min()?;
            Some(TemporalRange { start: Timestamp::MIN_UTC, end: anchor })
        }
        ParsedReference::AfterEntity(entity) => {
            let anchor = store.by_entity(entity).into_iter().map(|e| e.timestamp).max()?;
            Some(TemporalRange { start: anchor, end: now })
        }
    }
}

/// A scored hit from `TemporalSearch::search`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent {
    pub event: TemporalEvent,
    pub score: f32,
}

/// Parses free-text temporal queries and scores matching events by
/// entity/keyword/network match plus recency within the resolved range.
pub struct TemporalSearch<'a> {
    store: &'a TemporalEventStore,
}

impl<'a> TemporalSearch<'a> {
    pub fn new(store: &'a TemporalEventStore) -> Self {
        Self { store }
    }

    /// `query` may reference a temporal range ("last 30 days"), an
    /// entity, a network, and free keywords, all in the same string.
    /// Events outside a recognized range are excluded; everything else
    /// contributes to the score.
    pub fn search(&self, query: &str, now: Timestamp, network: Option<Network>) -> Vec<ScoredEvent> {
        let parsed = parse_temporal_reference(query);
        let range = parsed.as_ref().and_then(|p| resolve_range(p, now, self.store));

        let candidates: Vec<TemporalEvent> = match (range.as_ref(), network) {
            (Some(r), Some(n)) => self
                .store
                .in_time_range(r.start, r.end)
                .into_iter()
                .filter(|e| e.network == n)
                .collect(),
            (Some(r), None) => self.store.in_time_range(r.start, r.end),
            (None, Some(n)) => self.store.by_network(n),
            (None, None) => return Vec::new(),
        };

        let keywords: Vec<String> = query
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();

        let mut scored: Vec<ScoredEvent> = candidates
            .into_iter()
            .map(|event| {
                let score = self.score(&event, &keywords, now, range.as_ref());
                ScoredEvent { event, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    fn score(&self, event: &TemporalEvent, keywords: &[String], now: Timestamp, range: Option<&TemporalRange>) -> f32 {
        let content_lower = event.content.to_lowercase();
        let keyword_hits = keywords.iter().filter(|kw| content_lower.contains(kw.as_str())).count();
        let keyword_score = if keywords.is_empty() { 0.0 } else { keyword_hits as f32 / keywords.len() as f32 };

        let recency_score = match range {
            Some(r) => {
                let span = (r.end - r.start).num_seconds().max(1) as f32;
                let offset = (event.timestamp - r.start).num_seconds() as f32;
                (offset / span).clamp(0.0, 1.0)
            }
            None => {
                let age_days = (now - event.timestamp).num_seconds() as f32 / 86_400.0;
                1.0 / (1.0 + age_days.max(0.0))
            }
        };

        keyword_score * 0.7 + recency_score * 0.3
    }
}
