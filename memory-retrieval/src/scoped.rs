//! Cascading scope retrieval: USER → PROJECT → GLOBAL (component P).

use async_trait::async_trait;
use memory_core::{EntityIdType, Memory, SharedScope, UserId};
use std::collections::HashSet;

/// Source of per-scope results the scoped retriever cascades over. A real
/// deployment backs this with [`crate::hybrid::HybridRetriever`] plus a
/// shared-pool query; tests use a simple in-memory stub.
#[async_trait]
pub trait ScopeSource: Send + Sync {
    async fn retrieve_scope(
        &self,
        query: &str,
        user_id: UserId,
        scope: SharedScope,
        project_id: Option<&str>,
        limit: usize,
    ) -> Vec<Memory>;
}

/// Cascades from the requested scope up through strictly higher scopes,
/// deduplicating by memory id while preserving rank order.
pub struct ScopedRetriever<S: ScopeSource> {
    source: S,
}

impl<S: ScopeSource> ScopedRetriever<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Scopes strictly above `scope`, in ascending order, bounded to
    /// `USER < PROJECT < GLOBAL` per the spec (AGENT_PRIVATE/TEAM are not
    /// part of the scoped-retriever cascade).
    fn higher_scopes(scope: SharedScope) -> Vec<SharedScope> {
        [SharedScope::User, SharedScope::Project, SharedScope::Global]
            .into_iter()
            .filter(|s| *s > scope)
            .collect()
    }

    pub async fn retrieve(
        &self,
        query: &str,
        user_id: UserId,
        scope: SharedScope,
        project_id: Option<&str>,
        cascade: bool,
        limit: usize,
    ) -> Vec<Memory> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for memory in self
            .source
            .retrieve_scope(query, user_id, scope, project_id, limit)
            .await
        {
            if seen.insert(memory.id) {
                results.push(memory);
            }
        }

        if !cascade || results.len() >= limit {
            results.truncate(limit);
            return results;
        }

        for higher in Self::higher_scopes(scope) {
            if results.len() >= limit {
                break;
            }
            let remaining = limit - results.len();
            for memory in self
                .source
                .retrieve_scope(query, user_id, higher, project_id, remaining)
                .await
            {
                if results.len() >= limit {
                    break;
                }
                if seen.insert(memory.id) {
                    results.push(memory);
                }
            }
        }

        results.truncate(limit);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::MemoryType;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct StubSource {
        by_scope: Mutex<HashMap<SharedScope, Vec<Memory>>>,
    }

    #[async_trait]
    impl ScopeSource for StubSource {
        async fn retrieve_scope(
            &self,
            _query: &str,
            _user_id: UserId,
            scope: SharedScope,
            _project_id: Option<&str>,
            limit: usize,
        ) -> Vec<Memory> {
            self.by_scope
                .lock()
                .await
                .get(&scope)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(limit)
                .collect()
        }
    }

    fn memory(content: &str) -> Memory {
        Memory::new(UserId::now_v7(), content, MemoryType::Fact, 0.9, "test")
    }

    #[tokio::test]
    async fn cascades_to_higher_scope_when_short() {
        let user_only = memory("user scoped");
        let project_only = memory("project scoped");
        let mut by_scope = HashMap::new();
        by_scope.insert(SharedScope::User, vec![user_only.clone()]);
        by_scope.insert(SharedScope::Project, vec![project_only.clone()]);

        let retriever = ScopedRetriever::new(StubSource {
            by_scope: Mutex::new(by_scope),
        });

        let results = retriever
            .retrieve("q", UserId::now_v7(), SharedScope::User, None, true, 5)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, user_only.id);
        assert_eq!(results[1].id, project_only.id);
    }

    #[tokio::test]
    async fn no_cascade_stops_at_requested_scope() {
        let user_only = memory("user scoped");
        let mut by_scope = HashMap::new();
        by_scope.insert(SharedScope::User, vec![user_only.clone()]);
        by_scope.insert(SharedScope::Project, vec![memory("should not appear")]);

        let retriever = ScopedRetriever::new(StubSource {
            by_scope: Mutex::new(by_scope),
        });

        let results = retriever
            .retrieve("q", UserId::now_v7(), SharedScope::User, None, false, 5)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, user_only.id);
    }

    #[tokio::test]
    async fn deduplicates_across_scopes() {
        let shared = memory("appears twice");
        let mut by_scope = HashMap::new();
        by_scope.insert(SharedScope::User, vec![shared.clone()]);
        by_scope.insert(SharedScope::Project, vec![shared.clone()]);

        let retriever = ScopedRetriever::new(StubSource {
            by_scope: Mutex::new(by_scope),
        });

        let results = retriever
            .retrieve("q", UserId::now_v7(), SharedScope::User, None, true, 5)
            .await;
        assert_eq!(results.len(), 1);
    }
}
