//! Background maintenance: deduplication, contradiction handling, and
//! expiration cleanup (component M).

use crate::lifecycle::is_expired;
use memory_core::{EntityIdType, Memory, MemoryId, MemoryType, UserId};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::info;

/// Counters a janitor worker reports after a pass over one user's memories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub processed: usize,
    pub removed: usize,
    pub flagged: usize,
}

/// A contradiction flagged for human review. Both sides were high-confidence
/// so the janitor evicted the loser (per the "newer wins" rule) but still
/// surfaces the pair rather than silently discarding it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedContradiction {
    pub kept: MemoryId,
    pub evicted: MemoryId,
    pub category: &'static str,
    pub description: String,
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Jaccard similarity on case-folded word sets, used by the deduplicator.
/// Deliberately simpler than the legacy ranker's substring-bonus variant:
/// near-duplicate memories are rarely paraphrases, they're copies.
pub fn content_similarity(a: &str, b: &str) -> f32 {
    let sa = word_set(a);
    let sb = word_set(b);
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Removes near-duplicate memories (pairwise similarity above a threshold,
/// default 0.85), keeping the highest-confidence survivor and tie-breaking
/// on recency.
pub struct Deduplicator {
    pub threshold: f32,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self { threshold: 0.85 }
    }
}

impl Deduplicator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Returns the ids to delete from `memories`, which must already be
    /// scoped to a single user.
    pub fn run(&self, memories: &[Memory]) -> (WorkerReport, Vec<MemoryId>) {
        let mut to_delete: HashSet<MemoryId> = HashSet::new();
        for i in 0..memories.len() {
            if to_delete.contains(&memories[i].id) {
                continue;
            }
            for j in (i + 1)..memories.len() {
                if to_delete.contains(&memories[j].id) {
                    continue;
                }
                if content_similarity(&memories[i].content, &memories[j].content) <= self.threshold {
                    continue;
                }
                let loser = pick_loser(&memories[i], &memories[j]);
                to_delete.insert(loser);
            }
        }
        let report = WorkerReport {
            processed: memories.len(),
            removed: to_delete.len(),
            flagged: 0,
        };
        (report, to_delete.into_iter().collect())
    }
}

/// Keep the higher-confidence memory; tie-break on the newer `created_at`.
fn pick_loser<'a>(a: &'a Memory, b: &'a Memory) -> MemoryId {
    if a.confidence != b.confidence {
        if a.confidence > b.confidence {
            b.id
        } else {
            a.id
        }
    } else if a.created_at >= b.created_at {
        b.id
    } else {
        a.id
    }
}

struct Category {
    name: &'static str,
    terms: &'static [&'static str],
}

/// Fixed opposing-term categories. A memory "asserts" a category by
/// containing one of its terms; two same-type memories asserting different
/// terms in the same category are contradictory.
static CATEGORIES: &[Category] = &[
    Category {
        name: "database engine",
        terms: &["postgres", "postgresql", "mysql", "sqlite", "mongodb", "redis", "cassandra"],
    },
    Category {
        name: "framework",
        terms: &["react", "vue", "angular", "django", "rails", "express", "svelte", "actix", "axum"],
    },
    Category {
        name: "language",
        terms: &["python", "rust", "golang", "typescript", "javascript", "java", "ruby", "kotlin"],
    },
    Category {
        name: "formatting",
        terms: &["tabs", "spaces", "camelcase", "snake_case", "kebab-case"],
    },
];

fn asserted_terms<'a>(content: &str, category: &Category) -> Vec<&'a str> {
    let lower = content.to_lowercase();
    category
        .terms
        .iter()
        .copied()
        .filter(|t| lower.contains(t))
        .collect()
}

/// Detects and resolves contradictions between same-`memory_type` memories
/// within a single user's set, using the fixed category table. "Newer wins":
/// the older memory is evicted. When both sides are high-confidence, the
/// pair is also surfaced as a [`FlaggedContradiction`] rather than silently
/// discarded, per the contract that flagging annotates the eviction instead
/// of suppressing it.
pub struct ContradictionHandler {
    pub high_confidence_threshold: f32,
}

impl Default for ContradictionHandler {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.8,
        }
    }
}

impl ContradictionHandler {
    pub fn new(high_confidence_threshold: f32) -> Self {
        Self {
            high_confidence_threshold,
        }
    }

    pub fn run(&self, memories: &[Memory]) -> (WorkerReport, Vec<MemoryId>, Vec<FlaggedContradiction>) {
        let mut to_delete: HashSet<MemoryId> = HashSet::new();
        let mut flagged = Vec::new();

        for i in 0..memories.len() {
            for j in (i + 1)..memories.len() {
                let (a, b) = (&memories[i], &memories[j]);
                if a.memory_type != b.memory_type {
                    continue;
                }
                if to_delete.contains(&a.id) || to_delete.contains(&b.id) {
                    continue;
                }

                for category in CATEGORIES {
                    let terms_a = asserted_terms(&a.content, category);
                    let terms_b = asserted_terms(&b.content, category);
                    if terms_a.is_empty() || terms_b.is_empty() {
                        continue;
                    }
                    if terms_a.iter().any(|t| terms_b.contains(t)) {
                        continue;
                    }

                    let (newer, older) = if a.created_at >= b.created_at { (a, b) } else { (b, a) };
                    to_delete.insert(older.id);

                    if a.confidence >= self.high_confidence_threshold
                        && b.confidence >= self.high_confidence_threshold
                    {
                        flagged.push(FlaggedContradiction {
                            kept: newer.id,
                            evicted: older.id,
                            category: category.name,
                            description: format!(
                                "both memories are high-confidence but assert conflicting {} values",
                                category.name
                            ),
                        });
                    }
                    break;
                }
            }
        }

        let report = WorkerReport {
            processed: memories.len(),
            removed: to_delete.len(),
            flagged: flagged.len(),
        };
        (report, to_delete.into_iter().collect(), flagged)
    }
}

/// Deletes memories whose `expires_at` has passed.
#[derive(Debug, Default)]
pub struct ExpirationCleaner;

impl ExpirationCleaner {
    pub fn run(&self, memories: &[Memory]) -> (WorkerReport, Vec<MemoryId>) {
        let expired: Vec<MemoryId> = memories
            .iter()
            .filter(|m| is_expired(m.expires_at))
            .map(|m| m.id)
            .collect();
        let report = WorkerReport {
            processed: memories.len(),
            removed: expired.len(),
            flagged: 0,
        };
        (report, expired)
    }
}

/// Aggregate report from a single janitor pass over one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JanitorRunReport {
    pub user_id: Option<UserId>,
    pub dedup: WorkerReport,
    pub contradiction: WorkerReport,
    pub expiration: WorkerReport,
    pub deleted: Vec<MemoryId>,
    pub flagged: Vec<FlaggedContradiction>,
}

/// Runs the three workers in sequence (dedup, then contradictions, then
/// expiration) over a single user's memories. Each worker is idempotent and
/// operates on the ids surviving the previous worker.
pub struct JanitorRunner {
    pub deduplicator: Deduplicator,
    pub contradiction_handler: ContradictionHandler,
    pub expiration_cleaner: ExpirationCleaner,
}

impl Default for JanitorRunner {
    fn default() -> Self {
        Self {
            deduplicator: Deduplicator::default(),
            contradiction_handler: ContradictionHandler::default(),
            expiration_cleaner: ExpirationCleaner::default(),
        }
    }
}

impl JanitorRunner {
    pub fn run_for_user(&self, user_id: UserId, memories: &[Memory]) -> JanitorRunReport {
        let (dedup_report, dedup_deleted) = self.deduplicator.run(memories);
        let remaining: Vec<Memory> = memories
            .iter()
            .filter(|m| !dedup_deleted.contains(&m.id))
            .cloned()
            .collect();

        let (contradiction_report, contradiction_deleted, flagged) = self.contradiction_handler.run(&remaining);
        let remaining: Vec<Memory> = remaining
            .into_iter()
            .filter(|m| !contradiction_deleted.contains(&m.id))
            .collect();

        let (expiration_report, expired_deleted) = self.expiration_cleaner.run(&remaining);

        let mut deleted = dedup_deleted;
        deleted.extend(contradiction_deleted);
        deleted.extend(expired_deleted);

        info!(
            user_id = %user_id,
            removed = deleted.len(),
            flagged = flagged.len(),
            "janitor pass complete"
        );

        JanitorRunReport {
            user_id: Some(user_id),
            dedup: dedup_report,
            contradiction: contradiction_report,
            expiration: expiration_report,
            deleted,
            flagged,
        }
    }
}

/// Last-run-aware scheduler: `due()` is true once `interval` has elapsed
/// since the last recorded run. Does not itself own a timer; callers drive
/// it from their own scheduling loop (a `tokio::time::interval` or a cron).
pub struct JanitorScheduler {
    interval: chrono::Duration,
    last_run: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl JanitorScheduler {
    pub fn new(interval: chrono::Duration) -> Self {
        Self {
            interval,
            last_run: Mutex::new(None),
        }
    }

    pub fn with_default_interval() -> Self {
        Self::new(chrono::Duration::hours(24))
    }

    pub fn due(&self) -> bool {
        match *self.last_run.lock() {
            None => true,
            Some(last) => chrono::Utc::now() - last >= self.interval,
        }
    }

    pub fn record_run(&self) {
        *self.last_run.lock() = Some(chrono::Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::UserId;

    fn memory(user: UserId, content: &str, ty: MemoryType, confidence: f32) -> Memory {
        Memory::new(user, content, ty, confidence, "test")
    }

    #[test]
    fn deduplicator_keeps_highest_confidence() {
        let user = UserId::now_v7();
        let a = memory(user, "the sky is blue today", MemoryType::Fact, 0.5);
        let b = memory(user, "the sky is blue today indeed", MemoryType::Fact, 0.9);
        let dedup = Deduplicator::default();
        let (report, deleted) = dedup.run(&[a.clone(), b.clone()]);
        assert_eq!(report.removed, 1);
        assert_eq!(deleted, vec![a.id]);
    }

    #[test]
    fn dissimilar_memories_are_not_deduplicated() {
        let user = UserId::now_v7();
        let a = memory(user, "likes coffee in the morning", MemoryType::Preference, 0.8);
        let b = memory(user, "uses rust for backend services", MemoryType::Fact, 0.8);
        let dedup = Deduplicator::default();
        let (report, _) = dedup.run(&[a, b]);
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn contradiction_handler_evicts_older_and_flags_high_confidence() {
        let user = UserId::now_v7();
        let mut older = memory(user, "we use postgres for storage", MemoryType::Decision, 0.9);
        older.created_at = chrono::Utc::now() - chrono::Duration::days(10);
        let newer = memory(user, "we use mysql for storage", MemoryType::Decision, 0.9);

        let handler = ContradictionHandler::default();
        let (report, deleted, flagged) = handler.run(&[older.clone(), newer.clone()]);
        assert_eq!(deleted, vec![older.id]);
        assert_eq!(report.flagged, 1);
        assert_eq!(flagged[0].evicted, older.id);
        assert_eq!(flagged[0].kept, newer.id);
    }

    #[test]
    fn contradiction_handler_evicts_without_flag_at_low_confidence() {
        let user = UserId::now_v7();
        let mut older = memory(user, "we use postgres for storage", MemoryType::Decision, 0.3);
        older.created_at = chrono::Utc::now() - chrono::Duration::days(10);
        let newer = memory(user, "we use mysql for storage", MemoryType::Decision, 0.9);

        let handler = ContradictionHandler::default();
        let (report, deleted, flagged) = handler.run(&[older.clone(), newer]);
        assert_eq!(deleted, vec![older.id]);
        assert_eq!(report.flagged, 0);
        assert!(flagged.is_empty());
    }

    #[test]
    fn expiration_cleaner_removes_past_expiry() {
        let user = UserId::now_v7();
        let mut expired = memory(user, "stale", MemoryType::Context, 0.5);
        expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::days(1));
        let fresh = memory(user, "fresh", MemoryType::Context, 0.5);

        let cleaner = ExpirationCleaner;
        let (report, deleted) = cleaner.run(&[expired.clone(), fresh]);
        assert_eq!(report.removed, 1);
        assert_eq!(deleted, vec![expired.id]);
    }

    #[test]
    fn janitor_runner_composes_all_three_workers() {
        let user = UserId::now_v7();
        let mut expired = memory(user, "old session token rotated weekly", MemoryType::Fact, 0.5);
        expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::days(1));
        let keep = memory(user, "prefers dark mode interfaces", MemoryType::Preference, 0.7);

        let runner = JanitorRunner::default();
        let report = runner.run_for_user(user, &[expired.clone(), keep.clone()]);
        assert_eq!(report.deleted, vec![expired.id]);
        assert_eq!(report.expiration.removed, 1);
    }

    #[test]
    fn scheduler_is_due_initially_and_after_interval() {
        let scheduler = JanitorScheduler::new(chrono::Duration::milliseconds(0));
        assert!(scheduler.due());
        scheduler.record_run();
        assert!(scheduler.due());
    }

    #[test]
    fn scheduler_is_not_due_within_interval() {
        let scheduler = JanitorScheduler::new(chrono::Duration::hours(24));
        scheduler.record_run();
        assert!(!scheduler.due());
    }
}
