//! Master configuration for the engine.

use crate::error::{ConfigError, EngineResult};
use serde::{Deserialize, Serialize};

/// BM25 ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Token-budget configuration for the five context blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockBudgets {
    pub system: u32,
    pub project: u32,
    pub task: u32,
    pub history: u32,
    pub knowledge: u32,
}

impl Default for BlockBudgets {
    fn default() -> Self {
        Self {
            system: 500,
            project: 1000,
            task: 500,
            history: 1000,
            knowledge: 2000,
        }
    }
}

impl BlockBudgets {
    pub fn total(&self) -> u32 {
        self.system + self.project + self.task + self.history + self.knowledge
    }
}

/// Recall health thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecallThresholds {
    pub absolute: f32,
    pub drift: f32,
    pub cooldown_hours: i64,
}

impl Default for RecallThresholds {
    fn default() -> Self {
        Self {
            absolute: 0.90,
            drift: 0.05,
            cooldown_hours: 24,
        }
    }
}

/// Provenance/metadata DoS bounds (component K).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceLimits {
    pub max_id_len: usize,
    pub max_depth: usize,
    pub max_elements: usize,
    pub max_key_count: usize,
    pub max_key_len: usize,
    pub max_value_len: usize,
    pub max_serialized_bytes: usize,
    pub max_entries: usize,
    pub max_history_per_memory: usize,
}

impl Default for ProvenanceLimits {
    fn default() -> Self {
        Self {
            max_id_len: 256,
            max_depth: 5,
            max_elements: 500,
            max_key_count: 100,
            max_key_len: 256,
            max_value_len: 10_000,
            max_serialized_bytes: 10_000,
            max_entries: 10_000,
            max_history_per_memory: 100,
        }
    }
}

/// MaaS capacity and rate-limit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaasLimits {
    pub max_handoffs: usize,
    pub max_pending_per_target: usize,
    pub default_requests_per_minute: u32,
}

impl Default for MaasLimits {
    fn default() -> Self {
        Self {
            max_handoffs: 50_000,
            max_pending_per_target: 100,
            default_requests_per_minute: 60,
        }
    }
}

/// Retrieval cache configuration (component U).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 60,
            max_entries: 1000,
        }
    }
}

/// Lifecycle / decay defaults (component L).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecycleDefaults {
    pub default_ttl_days: i64,
    pub min_ttl_days: i64,
    pub max_ttl_days: i64,
    pub half_life_days: f64,
}

impl Default for LifecycleDefaults {
    fn default() -> Self {
        Self {
            default_ttl_days: 90,
            min_ttl_days: 1,
            max_ttl_days: 365,
            half_life_days: 30.0,
        }
    }
}

/// Master configuration struct. All values are required; use
/// [`EngineConfig::default_config`] for sane defaults and [`EngineConfig::validate`]
/// before relying on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub token_budget: u32,
    pub block_budgets: BlockBudgets,
    pub bm25: Bm25Params,
    pub rrf_k: u32,
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub graph_weight: f32,
    pub recall: RecallThresholds,
    pub provenance: ProvenanceLimits,
    pub maas: MaasLimits,
    pub cache: CacheConfig,
    pub lifecycle: LifecycleDefaults,
    pub dedup_similarity_threshold: f32,
    pub janitor_interval_hours: i64,
}

impl EngineConfig {
    /// Build a default, internally-consistent configuration.
    pub fn default_config() -> Self {
        Self {
            token_budget: 5000,
            block_budgets: BlockBudgets::default(),
            bm25: Bm25Params::default(),
            rrf_k: 60,
            bm25_weight: 1.0,
            vector_weight: 1.0,
            graph_weight: 0.5,
            recall: RecallThresholds::default(),
            provenance: ProvenanceLimits::default(),
            maas: MaasLimits::default(),
            cache: CacheConfig::default(),
            lifecycle: LifecycleDefaults::default(),
            dedup_similarity_threshold: 0.85,
            janitor_interval_hours: 24,
        }
    }

    /// Validate invariants that the rest of the engine assumes hold.
    pub fn validate(&self) -> EngineResult<()> {
        if self.token_budget == 0 {
            return Err(ConfigError::InvalidValue {
                field: "token_budget".into(),
                value: self.token_budget.to_string(),
                reason: "must be greater than 0".into(),
            }
            .into());
        }
        if self.block_budgets.total() > self.token_budget.saturating_mul(10) {
            return Err(ConfigError::InvalidValue {
                field: "block_budgets".into(),
                value: self.block_budgets.total().to_string(),
                reason: "block budgets are wildly larger than token_budget".into(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.recall.absolute) {
            return Err(ConfigError::InvalidValue {
                field: "recall.absolute".into(),
                value: self.recall.absolute.to_string(),
                reason: "must be in [0, 1]".into(),
            }
            .into());
        }
        if self.lifecycle.min_ttl_days > self.lifecycle.max_ttl_days {
            return Err(ConfigError::InvalidValue {
                field: "lifecycle.min_ttl_days".into(),
                value: self.lifecycle.min_ttl_days.to_string(),
                reason: "must be <= max_ttl_days".into(),
            }
            .into());
        }
        if self.lifecycle.half_life_days <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "lifecycle.half_life_days".into(),
                value: self.lifecycle.half_life_days.to_string(),
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.dedup_similarity_threshold < 0.0 || self.dedup_similarity_threshold > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "dedup_similarity_threshold".into(),
                value: self.dedup_similarity_threshold.to_string(),
                reason: "must be in [0, 1]".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default_config().validate().is_ok());
    }

    #[test]
    fn zero_token_budget_rejected() {
        let mut cfg = EngineConfig::default_config();
        cfg.token_budget = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_recall_threshold_rejected() {
        let mut cfg = EngineConfig::default_config();
        cfg.recall.absolute = 1.5;
        assert!(cfg.validate().is_err());
    }
}
