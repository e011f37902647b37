//! Per-tenant dense vector index (component C) and the embedding model
//! contract it depends on (§6).

use async_trait::async_trait;
use memory_core::{EntityIdType, MemoryId, StorageError};
use std::collections::HashMap;

/// Contract for an embedding model. Implementations may be lazily loaded;
/// callers degrade to non-vector paths when `encode` fails.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StorageError>;

    fn dimension(&self) -> usize;
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2-normalized embedding matrix plus parallel doc-id list for one tenant.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: usize,
    doc_ids: Vec<MemoryId>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            doc_ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add or replace a document's embedding.
    pub fn add_memory(&mut self, doc_id: MemoryId, mut embedding: Vec<f32>) {
        l2_normalize(&mut embedding);
        self.remove_memory(doc_id);
        self.doc_ids.push(doc_id);
        self.vectors.push(embedding);
    }

    /// Remove a document, shrinking the backing arrays.
    pub fn remove_memory(&mut self, doc_id: MemoryId) -> bool {
        if let Some(pos) = self.doc_ids.iter().position(|id| *id == doc_id) {
            self.doc_ids.remove(pos);
            self.vectors.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn clear_index(&mut self) {
        self.doc_ids.clear();
        self.vectors.clear();
    }

    /// Exact cosine search against the normalized matrix. `query` is
    /// normalized internally; no need for the caller to do so.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(MemoryId, f32)> {
        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(MemoryId, f32)> = self
            .doc_ids
            .iter()
            .zip(self.vectors.iter())
            .map(|(&id, v)| (id, dot(v, &q)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Cosine similarity between two raw (non-normalized) vectors.
    pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
        let mut na = a.to_vec();
        let mut nb = b.to_vec();
        l2_normalize(&mut na);
        l2_normalize(&mut nb);
        dot(&na, &nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_returns_closest_vector_first() {
        let mut idx = VectorIndex::new(3);
        let a = MemoryId::now_v7();
        let b = MemoryId::now_v7();
        idx.add_memory(a, vec![1.0, 0.0, 0.0]);
        idx.add_memory(b, vec![0.0, 1.0, 0.0]);

        let results = idx.search(&[0.9, 0.1, 0.0], 2);
        assert_eq!(results[0].0, a);
    }

    #[test]
    fn remove_shrinks_backing_arrays() {
        let mut idx = VectorIndex::new(2);
        let a = MemoryId::now_v7();
        idx.add_memory(a, vec![1.0, 0.0]);
        assert_eq!(idx.doc_count(), 1);
        assert!(idx.remove_memory(a));
        assert_eq!(idx.doc_count(), 0);
    }

    #[test]
    fn similarity_is_bounded() {
        let s = VectorIndex::similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-6);
        let s2 = VectorIndex::similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(s2.abs() < 1e-6);
    }

    #[test]
    fn zero_norm_vectors_do_not_panic() {
        let mut idx = VectorIndex::new(2);
        let a = MemoryId::now_v7();
        idx.add_memory(a, vec![0.0, 0.0]);
        let results = idx.search(&[0.0, 0.0], 1);
        assert_eq!(results.len(), 1);
    }
}
