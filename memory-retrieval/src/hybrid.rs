//! Two-stage hybrid retriever: lexical + vector (+ graph) fan-out, RRF
//! fusion, then reranking (component H).

use async_trait::async_trait;
use memory_core::{EntityIdType, Memory, MemoryId, RetrievalError, UserId};
use memory_index::{Bm25Index, EmbeddingModel, HybridDelegate, VectorIndex};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::graph::GraphSearch;
use crate::reranker::{FallbackReranker, Reranker};
use crate::rewriter::QueryRewriter;
use crate::rrf::RrfFusion;

/// One fused-and-reranked retrieval result.
#[derive(Debug, Clone)]
pub struct HybridResult {
    pub memory: Memory,
    pub score: f32,
    pub source_scores: HashMap<String, f32>,
    pub source_ranks: HashMap<String, usize>,
}

/// Per-query retrieval diagnostics (component H / §6).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalMetrics {
    pub total_time_ms: f64,
    pub stage1_time_ms: f64,
    pub stage2_time_ms: f64,
    pub bm25_candidates: usize,
    pub vector_candidates: usize,
    pub graph_candidates: usize,
    pub fused_candidates: usize,
    pub final_results: usize,
    pub query_expanded: bool,
    pub reranker_used: bool,
}

/// Summary statistics for one user's index partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub doc_count: usize,
    pub vector_dimension: usize,
}

struct TenantIndex {
    bm25: Bm25Index,
    vector: VectorIndex,
    memories: HashMap<MemoryId, Memory>,
}

/// Orchestrates BM25 + vector (+ graph) fan-out, RRF fusion, and reranking.
pub struct HybridRetriever {
    tenants: RwLock<HashMap<UserId, TenantIndex>>,
    graph: Option<Arc<RwLock<GraphSearch>>>,
    fusion: RrfFusion,
    reranker: Arc<dyn Reranker>,
    query_rewriter: Option<QueryRewriter>,
    embedding_model: Option<Arc<dyn EmbeddingModel>>,
    bm25_weight: f32,
    vector_weight: f32,
    graph_weight: f32,
    bm25_k1: f32,
    bm25_b: f32,
    vector_dimension: usize,
}

impl HybridRetriever {
    pub fn new(
        bm25_k1: f32,
        bm25_b: f32,
        vector_dimension: usize,
        bm25_weight: f32,
        vector_weight: f32,
        graph_weight: f32,
    ) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            graph: None,
            fusion: RrfFusion::default(),
            reranker: Arc::new(FallbackReranker),
            query_rewriter: None,
            embedding_model: None,
            bm25_weight,
            vector_weight,
            graph_weight,
            bm25_k1,
            bm25_b,
            vector_dimension,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_query_rewriter(mut self) -> Self {
        self.query_rewriter = Some(QueryRewriter::new());
        self
    }

    pub fn with_graph(mut self, graph: Arc<RwLock<GraphSearch>>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_embedding_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.embedding_model = Some(model);
        self
    }

    fn ensure_tenant<'a>(
        tenants: &'a mut HashMap<UserId, TenantIndex>,
        user_id: UserId,
        bm25_k1: f32,
        bm25_b: f32,
        vector_dimension: usize,
    ) -> &'a mut TenantIndex {
        tenants.entry(user_id).or_insert_with(|| TenantIndex {
            bm25: Bm25Index::new(bm25_k1, bm25_b),
            vector: VectorIndex::new(vector_dimension),
            memories: HashMap::new(),
        })
    }

    /// Index a batch of memories with precomputed embeddings (component H
    /// operation `index_memories`).
    pub fn index_memories(&self, user_id: UserId, memories: Vec<Memory>, embeddings: Vec<Vec<f32>>) {
        let mut tenants = self.tenants.write();
        let tenant =
            Self::ensure_tenant(&mut tenants, user_id, self.bm25_k1, self.bm25_b, self.vector_dimension);
        for (memory, embedding) in memories.into_iter().zip(embeddings) {
            tenant.bm25.add(memory.id, &memory.content);
            tenant.vector.add_memory(memory.id, embedding);
            tenant.memories.insert(memory.id, memory);
        }
    }

    /// Index one memory with its embedding.
    pub fn add_memory(&self, user_id: UserId, memory: Memory, embedding: Vec<f32>) {
        self.index_memories(user_id, vec![memory], vec![embedding]);
    }

    /// Index a memory lexically only (no embedding available yet). Used by
    /// the [`HybridDelegate`] hook so synchronous `store()` calls still get
    /// BM25 recall even before a vector embedding is computed out of band.
    pub fn add_memory_lexical_only(&self, memory: Memory) {
        let user_id = memory.user_id;
        let mut tenants = self.tenants.write();
        let tenant =
            Self::ensure_tenant(&mut tenants, user_id, self.bm25_k1, self.bm25_b, self.vector_dimension);
        tenant.bm25.add(memory.id, &memory.content);
        tenant.memories.insert(memory.id, memory);
    }

    pub fn remove_memory(&self, user_id: UserId, memory_id: MemoryId) {
        if let Some(tenant) = self.tenants.write().get_mut(&user_id) {
            tenant.bm25.remove(memory_id);
            tenant.vector.remove_memory(memory_id);
            tenant.memories.remove(&memory_id);
        }
    }

    pub fn clear_index(&self, user_id: UserId) {
        self.tenants.write().remove(&user_id);
    }

    pub fn has_index(&self, user_id: UserId) -> bool {
        self.tenants
            .read()
            .get(&user_id)
            .map(|t| t.bm25.doc_count() > 0 || !t.memories.is_empty())
            .unwrap_or(false)
    }

    pub fn index_stats(&self, user_id: UserId) -> Option<IndexStats> {
        self.tenants.read().get(&user_id).map(|t| IndexStats {
            doc_count: t.memories.len(),
            vector_dimension: t.vector.dimension(),
        })
    }

    /// `retrieve` without metrics, for callers that only want ranked memories.
    pub async fn retrieve_simple(
        &self,
        query: &str,
        user_id: UserId,
        top_k: usize,
    ) -> Vec<(Memory, f32)> {
        let (results, _) = self.retrieve(query, user_id, top_k, false, true).await;
        results.into_iter().map(|r| (r.memory, r.score)).collect()
    }

    /// Full two-stage retrieval: parallel Stage 1 (BM25 + vector + optional
    /// graph), Stage 2 fusion + rerank.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: UserId,
        top_k: usize,
        expand_query: bool,
        use_reranker: bool,
    ) -> (Vec<HybridResult>, RetrievalMetrics) {
        let total_start = Instant::now();

        if !self.has_index(user_id) {
            return (Vec::new(), RetrievalMetrics::default());
        }

        let effective_query = if expand_query {
            self.query_rewriter
                .map(|r| r.rewrite(query))
                .unwrap_or_else(|| query.to_string())
        } else {
            query.to_string()
        };

        let candidate_k = top_k * 2;
        let stage1_start = Instant::now();

        // Query embedding is computed once, outside the index lock, so an
        // async model call never blocks BM25/graph search.
        let query_embedding = match &self.embedding_model {
            Some(model) => model.encode(&[effective_query.clone()]).await.ok().and_then(|mut v| v.pop()),
            None => None,
        };

        let bm25_fut = async {
            let tenants = self.tenants.read();
            tenants
                .get(&user_id)
                .map(|t| t.bm25.search(&effective_query, candidate_k))
                .unwrap_or_default()
        };
        let vector_fut = async {
            let Some(query_embedding) = &query_embedding else {
                return Vec::new();
            };
            let tenants = self.tenants.read();
            tenants
                .get(&user_id)
                .map(|t| t.vector.search(query_embedding, candidate_k))
                .unwrap_or_default()
        };
        let graph_fut = async {
            if let Some(graph) = &self.graph {
                let graph = Arc::clone(graph);
                let query = effective_query.clone();
                tokio::task::spawn_blocking(move || graph.read().search(user_id, &query, candidate_k))
                    .await
                    .unwrap_or_default()
            } else {
                Vec::new()
            }
        };

        let (bm25_results, vector_results, graph_results) = tokio::join!(bm25_fut, vector_fut, graph_fut);

        let stage1_time_ms = stage1_start.elapsed().as_secs_f64() * 1000.0;

        let stage2_start = Instant::now();

        let bm25_ids: Vec<MemoryId> = bm25_results.iter().map(|(id, _)| *id).collect();
        let vector_ids: Vec<MemoryId> = vector_results.iter().map(|(id, _)| *id).collect();
        let graph_ids: Vec<MemoryId> = graph_results.iter().map(|(id, _)| *id).collect();

        let mut weights = HashMap::new();
        weights.insert("bm25".to_string(), self.bm25_weight);
        weights.insert("vector".to_string(), self.vector_weight);
        weights.insert("graph".to_string(), self.graph_weight);

        let mut lists: Vec<(&str, &[MemoryId])> = vec![("bm25", &bm25_ids), ("vector", &vector_ids)];
        if self.graph.is_some() {
            lists.push(("graph", &graph_ids));
        }

        let fused = self.fusion.weighted_fuse(&lists, &weights);
        let fused_candidates = fused.len();

        let bm25_rank: HashMap<MemoryId, usize> =
            bm25_ids.iter().enumerate().map(|(i, id)| (*id, i + 1)).collect();
        let vector_rank: HashMap<MemoryId, usize> =
            vector_ids.iter().enumerate().map(|(i, id)| (*id, i + 1)).collect();
        let bm25_score: HashMap<MemoryId, f32> = bm25_results.into_iter().collect();
        let vector_score: HashMap<MemoryId, f32> = vector_results.into_iter().collect();

        let tenants = self.tenants.read();
        let tenant = tenants.get(&user_id).expect("checked has_index above");

        let fused_memories: Vec<(Memory, f32, HashMap<String, f32>, HashMap<String, usize>)> = fused
            .into_iter()
            .filter_map(|(id, score)| {
                let memory = tenant.memories.get(&id)?.clone();
                if memory.is_hidden() {
                    return None;
                }
                let mut source_scores = HashMap::new();
                let mut source_ranks = HashMap::new();
                if let Some(&s) = bm25_score.get(&id) {
                    source_scores.insert("bm25".to_string(), s);
                }
                if let Some(&r) = bm25_rank.get(&id) {
                    source_ranks.insert("bm25".to_string(), r);
                }
                if let Some(&s) = vector_score.get(&id) {
                    source_scores.insert("vector".to_string(), s);
                }
                if let Some(&r) = vector_rank.get(&id) {
                    source_ranks.insert("vector".to_string(), r);
                }
                Some((memory, score, source_scores, source_ranks))
            })
            .take(candidate_k.max(top_k))
            .collect();
        drop(tenants);

        let documents: Vec<Memory> = fused_memories.iter().map(|(m, ..)| m.clone()).collect();
        let reranked = if use_reranker {
            self.reranker.rerank(&effective_query, documents, top_k).await
        } else {
            FallbackReranker.rerank(&effective_query, documents, top_k).await
        };

        let mut results = Vec::with_capacity(reranked.len());
        for rerank_result in reranked {
            if let Some((memory, fused_score, mut source_scores, source_ranks)) = fused_memories
                .iter()
                .find(|(m, ..)| m.id == rerank_result.document.id)
                .cloned()
            {
                source_scores.insert("reranker".to_string(), rerank_result.score);
                results.push(HybridResult {
                    memory,
                    score: fused_score,
                    source_scores,
                    source_ranks,
                });
            }
        }

        let stage2_time_ms = stage2_start.elapsed().as_secs_f64() * 1000.0;
        let total_time_ms = total_start.elapsed().as_secs_f64() * 1000.0;

        let metrics = RetrievalMetrics {
            total_time_ms,
            stage1_time_ms,
            stage2_time_ms,
            bm25_candidates: bm25_ids.len(),
            vector_candidates: vector_ids.len(),
            graph_candidates: graph_ids.len(),
            fused_candidates,
            final_results: results.len(),
            query_expanded: expand_query,
            reranker_used: use_reranker,
        };

        (results, metrics)
    }
}

#[async_trait]
impl HybridDelegate for HybridRetriever {
    async fn retrieve_delegate(&self, query: &str, user_id: UserId, limit: usize) -> Vec<(Memory, f32)> {
        self.retrieve_simple(query, user_id, limit).await
    }

    fn has_index(&self, user_id: UserId) -> bool {
        HybridRetriever::has_index(self, user_id)
    }

    fn index_memory(&self, memory: &Memory) {
        self.add_memory_lexical_only(memory.clone());
    }

    fn remove_from_index(&self, user_id: UserId, memory_id: MemoryId) {
        self.remove_memory(user_id, memory_id);
    }
}

/// Factory mirroring the spec's `create_hybrid_retriever`.
pub fn create_hybrid_retriever(
    use_query_rewriter: bool,
    bm25_weight: f32,
    vector_weight: f32,
) -> HybridRetriever {
    let retriever = HybridRetriever::new(1.5, 0.75, 384, bm25_weight, vector_weight, 0.5);
    if use_query_rewriter {
        retriever.with_query_rewriter()
    } else {
        retriever
    }
}

/// Validate a requested `top_k`.
pub fn validate_top_k(top_k: i64) -> Result<usize, RetrievalError> {
    if top_k < 1 {
        return Err(RetrievalError::InvalidTopK(top_k));
    }
    Ok(top_k as usize)
}
