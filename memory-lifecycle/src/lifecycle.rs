//! TTL expiration and decay scoring (component L).

use memory_core::{LifecycleError, Timestamp};
use chrono::Utc;

pub const DEFAULT_TTL_DAYS: i64 = 90;
pub const MIN_TTL_DAYS: i64 = 1;
pub const MAX_TTL_DAYS: i64 = 365;
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;

/// Compute `created_at + ttl_days`, rejecting a `ttl_days` outside
/// `[MIN_TTL_DAYS, MAX_TTL_DAYS]`.
pub fn calculate_expiration(created_at: Timestamp, ttl_days: i64) -> Result<Timestamp, LifecycleError> {
    if !(MIN_TTL_DAYS..=MAX_TTL_DAYS).contains(&ttl_days) {
        return Err(LifecycleError::InvalidTtl {
            days: ttl_days,
            min: MIN_TTL_DAYS,
            max: MAX_TTL_DAYS,
        });
    }
    Ok(created_at + chrono::Duration::days(ttl_days))
}

/// `true` when `expires_at` is set and in the past.
pub fn is_expired(expires_at: Option<Timestamp>) -> bool {
    expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
}

/// Exponential decay `0.5^(age_days / half_life_days)`. A non-positive
/// `half_life_days` is degenerate (a memory with no half-life decays to
/// zero relevance immediately) so it short-circuits to `0.0` rather than
/// dividing by zero.
pub fn calculate_decay_score(age_days: f64, half_life_days: f64) -> f32 {
    if half_life_days <= 0.0 {
        return 0.0;
    }
    if age_days <= 0.0 {
        return 1.0;
    }
    0.5f64.powf(age_days / half_life_days) as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceWeights {
    pub similarity: f32,
    pub decay: f32,
    pub confidence: f32,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            decay: 0.25,
            confidence: 0.15,
        }
    }
}

/// Composite relevance combining a retrieval similarity score, time decay,
/// and the memory's own confidence. `weights` is expected (not enforced) to
/// sum to 1.0.
pub fn composite_relevance(similarity: f32, decay: f32, confidence: f32, weights: RelevanceWeights) -> f32 {
    weights.similarity * similarity + weights.decay * decay + weights.confidence * confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_adds_ttl_days() {
        let created = Utc::now();
        let expires = calculate_expiration(created, 90).unwrap();
        assert_eq!((expires - created).num_days(), 90);
    }

    #[test]
    fn expiration_rejects_out_of_range_ttl() {
        assert!(calculate_expiration(Utc::now(), 0).is_err());
        assert!(calculate_expiration(Utc::now(), 366).is_err());
    }

    #[test]
    fn is_expired_checks_against_now() {
        assert!(!is_expired(None));
        assert!(!is_expired(Some(Utc::now() + chrono::Duration::days(1))));
        assert!(is_expired(Some(Utc::now() - chrono::Duration::days(1))));
    }

    #[test]
    fn decay_is_bounded_and_decreasing() {
        let fresh = calculate_decay_score(0.0, 30.0);
        let half_life = calculate_decay_score(30.0, 30.0);
        let old = calculate_decay_score(90.0, 30.0);
        assert!((fresh - 1.0).abs() < 1e-6);
        assert!((half_life - 0.5).abs() < 1e-3);
        assert!(old < half_life);
        assert!(old >= 0.0);
    }

    #[test]
    fn zero_half_life_guard_returns_zero() {
        assert_eq!(calculate_decay_score(10.0, 0.0), 0.0);
        assert_eq!(calculate_decay_score(10.0, -5.0), 0.0);
    }

    #[test]
    fn composite_relevance_is_weighted_sum() {
        let weights = RelevanceWeights::default();
        let score = composite_relevance(1.0, 1.0, 1.0, weights);
        assert!((score - 1.0).abs() < 1e-5);
    }
}
