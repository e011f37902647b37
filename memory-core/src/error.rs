//! Error types for engine operations.

use crate::identity::{AgentId, HandoffId, MemoryId, PoolId};
use thiserror::Error;

/// Errors surfaced by storage and indexing components (B, C, D, A).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("memory not found: {0}")]
    NotFound(MemoryId),

    #[error("no index for user")]
    NoIndex,

    #[error("corpus too large for brute-force search: {size} > {limit}")]
    CorpusTooLarge { size: usize, limit: usize },

    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },
}

/// Errors surfaced by the hybrid retriever and fusion stage (E, F, G, H, I, P).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetrievalError {
    #[error("invalid RRF k: {0} (must be >= 0)")]
    InvalidRrfK(i64),

    #[error("invalid top_k: {0} (must be >= 1)")]
    InvalidTopK(i64),

    #[error("hybrid mode required for this operation")]
    HybridRequired,
}

/// Validation failures for provenance, metadata, and config bounds (K, J).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} exceeds limit: {reason}")]
    ExceedsLimit { field: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unsupported metadata type for key {key}")]
    UnsupportedType { key: String },
}

/// Errors from the MaaS core (R).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MaasError {
    #[error("agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("pool already registered: {0}")]
    DuplicatePool(PoolId),

    #[error("handoff capacity exceeded: {reason}")]
    CapacityExceeded { reason: String },

    #[error("rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("unknown handoff: {0}")]
    UnknownHandoff(HandoffId),
}

/// Path safety violations for the recall baseline store (N).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathSafetyError {
    #[error("refusing to operate on a symlink: {0}")]
    SymlinkRejected(String),

    #[error("path escapes storage root: {0}")]
    Escapes(String),
}

/// Lifecycle / janitor errors (L, M).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("invalid ttl_days: {0} (must be in [{min}, {max}])")]
    InvalidTtl { days: i64, min: i64, max: i64 },
}

/// Evaluation harness errors (T).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("failed to read golden set at {path}: {reason}")]
    GoldenSetIo { path: String, reason: String },

    #[error("failed to parse golden set: {0}")]
    GoldenSetParse(String),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level error type for the engine.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("maas error: {0}")]
    Maas(#[from] MaasError),

    #[error("path safety error: {0}")]
    PathSafety(#[from] PathSafetyError),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
