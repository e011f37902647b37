//! Reciprocal Rank Fusion (component E).

use memory_core::{EntityIdType, MemoryId, RetrievalError};
use std::collections::HashMap;

/// Per-source rank/score detail returned by [`fuse_with_details`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusionDetail {
    pub item: MemoryId,
    pub fused_score: f32,
    pub source_ranks: HashMap<String, usize>,
    pub source_scores: HashMap<String, f32>,
}

/// Score-agnostic rank fusion over any number of named ranked lists.
#[derive(Debug, Clone, Copy)]
pub struct RrfFusion {
    pub k: u32,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: 60 }
    }
}

impl RrfFusion {
    pub fn new(k: u32) -> Self {
        Self { k }
    }

    /// `score(d) = sum_i 1/(k + rank_i(d))`, ranks are 1-based.
    pub fn fuse(
        &self,
        lists: &[(&str, &[MemoryId])],
    ) -> Vec<(MemoryId, f32)> {
        self.weighted_fuse(lists, &HashMap::new())
    }

    /// Weighted variant: `score(d) = sum_i w_i/(k + rank_i(d))`, default weight 1.
    pub fn weighted_fuse(
        &self,
        lists: &[(&str, &[MemoryId])],
        weights: &HashMap<String, f32>,
    ) -> Vec<(MemoryId, f32)> {
        let mut scores: HashMap<MemoryId, f32> = HashMap::new();
        for (source, items) in lists {
            let weight = weights.get(*source).copied().unwrap_or(1.0);
            for (idx, item) in items.iter().enumerate() {
                let rank = idx + 1;
                let contribution = weight / (self.k as f32 + rank as f32);
                *scores.entry(*item).or_insert(0.0) += contribution;
            }
        }
        let mut ranked: Vec<(MemoryId, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Fuse with full per-source rank/score detail retained.
    pub fn fuse_with_details(&self, lists: &[(&str, &[(MemoryId, f32)])]) -> Vec<FusionDetail> {
        let mut details: HashMap<MemoryId, FusionDetail> = HashMap::new();
        for (source, items) in lists {
            for (idx, (item, score)) in items.iter().enumerate() {
                let rank = idx + 1;
                let contribution = 1.0 / (self.k as f32 + rank as f32);
                let entry = details.entry(*item).or_insert_with(|| FusionDetail {
                    item: *item,
                    fused_score: 0.0,
                    source_ranks: HashMap::new(),
                    source_scores: HashMap::new(),
                });
                entry.fused_score += contribution;
                entry.source_ranks.insert(source.to_string(), rank);
                entry.source_scores.insert(source.to_string(), *score);
            }
        }
        let mut ranked: Vec<FusionDetail> = details.into_values().collect();
        ranked.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Round-robin interleave, de-duplicated, with a monotonically
    /// decreasing positional score.
    pub fn interleave(&self, lists: &[(&str, &[MemoryId])]) -> Vec<(MemoryId, f32)> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let max_len = lists.iter().map(|(_, l)| l.len()).max().unwrap_or(0);
        for i in 0..max_len {
            for (_, list) in lists {
                if let Some(item) = list.get(i) {
                    if seen.insert(*item) {
                        out.push(*item);
                    }
                }
            }
        }
        let n = out.len().max(1) as f32;
        out.into_iter()
            .enumerate()
            .map(|(idx, item)| (item, (n - idx as f32) / n))
            .collect()
    }
}

/// Validate an RRF `k` parameter; `k < 0` is a validation failure.
pub fn validate_rrf_k(k: i64) -> Result<u32, RetrievalError> {
    if k < 0 {
        return Err(RetrievalError::InvalidRrfK(k));
    }
    Ok(k as u32)
}

/// Min-max normalize scores into `[0, 1]`. Degenerate (all-equal) input maps
/// to all `1.0`.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Truncate a ranked list to its top `k` entries.
pub fn top_k<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    items.iter().take(k).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_matches_formula() {
        let fusion = RrfFusion::new(60);
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let list = [a, b];
        let result = fusion.fuse(&[("bm25", &list)]);
        assert_eq!(result[0], (a, 1.0 / 61.0));
        assert_eq!(result[1], (b, 1.0 / 62.0));
    }

    #[test]
    fn k_zero_rank_one_scores_one() {
        let fusion = RrfFusion::new(0);
        let a = MemoryId::now_v7();
        let list = [a];
        let result = fusion.fuse(&[("bm25", &list)]);
        assert_eq!(result[0], (a, 1.0));
    }

    #[test]
    fn negative_k_is_rejected() {
        assert!(validate_rrf_k(-1).is_err());
        assert!(validate_rrf_k(0).is_ok());
    }

    #[test]
    fn normalize_scores_maps_min_max() {
        let scores = vec![1.0, 2.0, 3.0];
        let normalized = normalize_scores(&scores);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[2], 1.0);
    }

    #[test]
    fn normalize_scores_degenerate_all_equal() {
        let scores = vec![5.0, 5.0, 5.0];
        let normalized = normalize_scores(&scores);
        assert!(normalized.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn interleave_deduplicates_round_robin() {
        let fusion = RrfFusion::default();
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        let c = MemoryId::now_v7();
        let list1 = [a, b];
        let list2 = [b, c];
        let result = fusion.interleave(&[("bm25", &list1), ("vector", &list2)]);
        let items: Vec<_> = result.iter().map(|(id, _)| *id).collect();
        assert_eq!(items, vec![a, b, c]);
        // monotonically decreasing
        for pair in result.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn weighted_fuse_respects_weights() {
        let fusion = RrfFusion::new(60);
        let a = MemoryId::now_v7();
        let list = [a];
        let mut weights = HashMap::new();
        weights.insert("bm25".to_string(), 2.0);
        let result = fusion.weighted_fuse(&[("bm25", &list)], &weights);
        assert_eq!(result[0].1, 2.0 / 61.0);
    }
}
