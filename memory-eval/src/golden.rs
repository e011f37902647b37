//! Golden-set loading (component T).

use memory_core::EvalError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenQuestion {
    pub id: String,
    pub category: String,
    pub question: String,
    pub expected_memory_type: String,
    pub expected_scope: String,
    pub expected_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenSet {
    pub version: String,
    pub questions: Vec<GoldenQuestion>,
}

impl GoldenSet {
    pub fn filtered_by_category<'a>(&'a self, category: &str) -> Vec<&'a GoldenQuestion> {
        self.questions.iter().filter(|q| q.category == category).collect()
    }
}

/// Load a golden-set JSON file from disk.
pub fn load_golden_set(path: impl AsRef<Path>) -> Result<GoldenSet, EvalError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| EvalError::GoldenSetIo {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&contents).map_err(|e| EvalError::GoldenSetParse(e.to_string()))
}
