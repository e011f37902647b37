//! Memory Engine Index - per-tenant lexical/vector/ground-truth indexes and
//! the retrieval cache.
//!
//! Components B (BM25), C (vector), D (brute-force ground truth), U (cache),
//! and A (memory provider CRUD).

pub mod bm25;
pub mod brute_force;
pub mod cache;
pub mod provider;
pub mod vector;

pub use bm25::{tokenize, Bm25Index};
pub use brute_force::{BruteForceSearcher, MAX_CORPUS_SIZE};
pub use cache::{CacheMetrics, RetrievalCache};
pub use provider::{
    HybridDelegate, InMemoryMemoryProvider, MemoryProvider, MemoryUpdate, SearchFilters,
};
pub use vector::{EmbeddingModel, VectorIndex};
