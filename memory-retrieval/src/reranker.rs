//! Cross-encoder reranking with a fallback (component F).

use async_trait::async_trait;
use memory_core::{EntityIdType, Memory, StorageError};

/// One reranked document with its scalar relevance and original rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub document: Memory,
    pub score: f32,
    pub original_index: usize,
}

/// Contract for a cross-encoder model scoring `(query, document)` pairs.
#[async_trait]
pub trait CrossEncoderModel: Send + Sync {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, StorageError>;
}

/// Reranker contract implemented by both the cross-encoder and fallback
/// rerankers so the hybrid retriever can treat them uniformly.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<Memory>,
        top_k: usize,
    ) -> Vec<RerankResult>;
}

/// Scores documents with a cross-encoder model.
pub struct CrossEncoderReranker<M: CrossEncoderModel> {
    model: M,
}

impl<M: CrossEncoderModel> CrossEncoderReranker<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: CrossEncoderModel> Reranker for CrossEncoderReranker<M> {
    async fn rerank(&self, query: &str, documents: Vec<Memory>, top_k: usize) -> Vec<RerankResult> {
        let pairs: Vec<(String, String)> = documents
            .iter()
            .map(|d| (query.to_string(), d.content.clone()))
            .collect();

        let scores = match self.model.predict(&pairs).await {
            Ok(scores) => scores,
            Err(_) => {
                // Model failure degrades to fallback ordering rather than
                // dropping the candidate set.
                return FallbackReranker.rerank(query, documents, top_k).await;
            }
        };

        let mut results: Vec<RerankResult> = documents
            .into_iter()
            .zip(scores)
            .enumerate()
            .map(|(idx, (document, score))| RerankResult {
                document,
                score,
                original_index: idx,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }
}

/// Preserves input order; used when the cross-encoder is disabled or
/// unavailable. Score is `1/(rank+1)` so downstream fusion still gets a
/// monotonically decreasing signal.
pub struct FallbackReranker;

#[async_trait]
impl Reranker for FallbackReranker {
    async fn rerank(&self, _query: &str, documents: Vec<Memory>, top_k: usize) -> Vec<RerankResult> {
        documents
            .into_iter()
            .enumerate()
            .map(|(idx, document)| RerankResult {
                document,
                score: 1.0 / (idx as f32 + 1.0),
                original_index: idx,
            })
            .take(top_k)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::{MemoryType, UserId};

    struct MockModel;

    #[async_trait]
    impl CrossEncoderModel for MockModel {
        async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, StorageError> {
            Ok(pairs
                .iter()
                .map(|(_, doc)| if doc.contains("postgresql") { 0.9 } else { 0.1 })
                .collect())
        }
    }

    fn memory(content: &str) -> Memory {
        Memory::new(UserId::now_v7(), content, MemoryType::Fact, 0.8, "test")
    }

    #[tokio::test]
    async fn cross_encoder_reorders_by_relevance() {
        let reranker = CrossEncoderReranker::new(MockModel);
        let docs = vec![memory("redis caching"), memory("postgresql storage")];
        let results = reranker.rerank("database", docs, 2).await;
        assert!(results[0].document.content.contains("postgresql"));
    }

    #[tokio::test]
    async fn fallback_preserves_input_order() {
        let docs = vec![memory("first"), memory("second")];
        let results = FallbackReranker.rerank("q", docs, 2).await;
        assert_eq!(results[0].document.content, "first");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.5);
    }
}
