//! Memory Engine Evaluation - golden-set evaluation harness and report
//! generation.
//!
//! Component T.

pub mod golden;
pub mod harness;
pub mod report;

pub use golden::{load_golden_set, GoldenQuestion, GoldenSet};
pub use harness::{EvaluationHarness, QuestionOutcome};
pub use report::{
    accuracy, f1_score, generate_json_report, generate_markdown_report, latency_stats, precision, recall,
    CategoryBreakdown, EvaluationReport, LatencyStats,
};
