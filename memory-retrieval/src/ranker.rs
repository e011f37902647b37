//! Legacy linear-weighted ranker (component O), kept alongside the hybrid
//! retriever for callers that don't need BM25/vector infrastructure.

use chrono::Utc;
use memory_core::{EntityIdType, Memory, Provenance};
use std::collections::HashSet;

/// Weights for the linear combination; must sum to (approximately) 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankerWeights {
    pub similarity: f32,
    pub recency: f32,
    pub confidence: f32,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            recency: 0.3,
            confidence: 0.2,
        }
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Jaccard similarity on case-folded word sets, with a bonus for an exact
/// substring match.
pub fn similarity(query: &str, content: &str) -> f32 {
    let q = word_set(query);
    let c = word_set(content);
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }
    let intersection = q.intersection(&c).count() as f32;
    let union = q.union(&c).count() as f32;
    let jaccard = intersection / union.max(1.0);

    let bonus = if content.to_lowercase().contains(&query.to_lowercase()) {
        0.3
    } else {
        0.0
    };
    (jaccard + bonus).min(1.0)
}

/// Exponential recency decay with a 90-day linear fallback when `half_life_days`
/// is non-positive.
pub fn recency(created_at: chrono::DateTime<Utc>, half_life_days: f32) -> f32 {
    let age_days = (Utc::now() - created_at).num_seconds() as f32 / 86_400.0;
    let age_days = age_days.max(0.0);
    if half_life_days > 0.0 {
        0.5f32.powf(age_days / half_life_days)
    } else {
        (1.0 - age_days / 90.0).clamp(0.0, 1.0)
    }
}

/// Linear-combination legacy ranker: `w_s*similarity + w_r*recency + w_c*confidence`.
pub struct Ranker {
    weights: RankerWeights,
    half_life_days: f32,
}

impl Ranker {
    pub fn new(weights: RankerWeights, half_life_days: f32) -> Self {
        Self {
            weights,
            half_life_days,
        }
    }

    pub fn score(&self, query: &str, memory: &Memory) -> f32 {
        let sim = similarity(query, &memory.content);
        let rec = recency(memory.created_at, self.half_life_days);
        self.weights.similarity * sim + self.weights.recency * rec + self.weights.confidence * memory.confidence
    }

    /// Rank memories by score, descending, attaching/updating a `Provenance`
    /// record that carries `retrieval_score` equal to the final score
    /// (testable property #11).
    pub fn rank_with_provenance(&self, query: &str, mut memories: Vec<Memory>) -> Vec<Memory> {
        let mut scored: Vec<(f32, Memory)> = memories
            .drain(..)
            .map(|m| (self.score(query, &m), m))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .map(|(score, mut memory)| {
                let provenance = memory
                    .provenance
                    .take()
                    .unwrap_or_else(|| Provenance::new(memory.id.to_string(), "legacy_ranker", memory.confidence))
                    .with_retrieval_score(score);
                memory.provenance = Some(provenance);
                memory
            })
            .collect()
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(RankerWeights::default(), 30.0)
    }
}
