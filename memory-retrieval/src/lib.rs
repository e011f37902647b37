//! Memory Engine Retrieval - hybrid (lexical + vector + graph) search,
//! reciprocal rank fusion, reranking, query expansion, the knowledge graph,
//! the scoped cascade, and the legacy linear ranker.
//!
//! Components E (fusion), F (reranker), G (rewriter), H (hybrid retriever),
//! I (knowledge graph), O (legacy ranker), P (scoped retriever). The
//! retrieval cache (component U) lives in `memory-index` alongside the
//! other per-tenant indexes it wraps.

pub mod graph;
pub mod hybrid;
pub mod ranker;
pub mod reranker;
pub mod rewriter;
pub mod rrf;
pub mod scoped;

pub use graph::{EntityMention, GraphBuilder, GraphSearch, KnowledgeGraph};
pub use hybrid::{create_hybrid_retriever, HybridResult, HybridRetriever, IndexStats, RetrievalMetrics};
pub use ranker::{Ranker, RankerWeights};
pub use reranker::{CrossEncoderModel, CrossEncoderReranker, FallbackReranker, RerankResult, Reranker};
pub use rewriter::QueryRewriter;
pub use rrf::{normalize_scores, top_k, validate_rrf_k, FusionDetail, RrfFusion};
pub use scoped::{ScopeSource, ScopedRetriever};
