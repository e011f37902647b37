//! Synonym-expansion query rewriter (component G).

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("auth", &["authentication", "login"][..]),
        ("authentication", &["auth", "login"][..]),
        ("login", &["auth", "authentication"][..]),
        ("db", &["database", "storage"][..]),
        ("database", &["db", "storage"][..]),
        ("storage", &["db", "database"][..]),
        ("python", &["py"][..]),
        ("py", &["python"][..]),
        ("k8s", &["kubernetes"][..]),
        ("kubernetes", &["k8s"][..]),
        ("js", &["javascript"][..]),
        ("javascript", &["js"][..]),
        ("config", &["configuration", "settings"][..]),
        ("configuration", &["config", "settings"][..]),
    ])
});

/// Expands query terms with a static domain-synonym table.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryRewriter;

impl QueryRewriter {
    pub fn new() -> Self {
        Self
    }

    /// `term` plus its synonyms, case-folded.
    pub fn expand(&self, term: &str) -> Vec<String> {
        let folded = term.to_lowercase();
        let mut out = vec![folded.clone()];
        if let Some(syns) = SYNONYMS.get(folded.as_str()) {
            out.extend(syns.iter().map(|s| s.to_string()));
        }
        out
    }

    /// Union of [`expand`] over every whitespace-delimited token in `query`.
    pub fn expand_query(&self, query: &str) -> HashSet<String> {
        query.split_whitespace().flat_map(|t| self.expand(t)).collect()
    }

    /// Space-joined expanded query, suitable for feeding back into lexical
    /// search.
    pub fn rewrite(&self, query: &str) -> String {
        let mut expanded: Vec<String> = self.expand_query(query).into_iter().collect();
        expanded.sort();
        expanded.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_includes_term_and_synonyms() {
        let rewriter = QueryRewriter::new();
        let expanded = rewriter.expand("DB");
        assert!(expanded.contains(&"db".to_string()));
        assert!(expanded.contains(&"database".to_string()));
    }

    #[test]
    fn expand_unknown_term_returns_itself() {
        let rewriter = QueryRewriter::new();
        assert_eq!(rewriter.expand("widget"), vec!["widget".to_string()]);
    }

    #[test]
    fn rewrite_is_deterministic_and_space_joined() {
        let rewriter = QueryRewriter::new();
        let rewritten = rewriter.rewrite("auth db");
        assert!(rewritten.contains("auth"));
        assert!(rewritten.contains("database"));
    }
}
