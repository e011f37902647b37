//! Memory Engine Lifecycle - TTL/decay scoring, janitor maintenance, and
//! recall-health drift detection.
//!
//! Components L (lifecycle), M (janitor), and N (recall health).

pub mod janitor;
pub mod lifecycle;
pub mod recall_health;

pub use janitor::{
    content_similarity, ContradictionHandler, Deduplicator, ExpirationCleaner, FlaggedContradiction,
    JanitorRunReport, JanitorRunner, JanitorScheduler, WorkerReport,
};
pub use lifecycle::{
    calculate_decay_score, calculate_expiration, composite_relevance, is_expired, RelevanceWeights,
    DEFAULT_HALF_LIFE_DAYS, DEFAULT_TTL_DAYS, MAX_TTL_DAYS, MIN_TTL_DAYS,
};
pub use recall_health::{
    recall_at_k, BaselineStore, EmbeddingVersionTracker, RecallHealthMonitor, RecallVerdict, ReindexTrigger,
    ABSOLUTE_THRESHOLD, DRIFT_THRESHOLD,
};
