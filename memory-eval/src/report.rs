//! Evaluation report aggregation and rendering (component T, §6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub passed: usize,
    pub failed: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Nearest-rank percentile over `latencies_ms`. Empty input yields all
/// zeros rather than panicking on an empty slice.
pub fn latency_stats(latencies_ms: &[f64]) -> LatencyStats {
    if latencies_ms.is_empty() {
        return LatencyStats::default();
    }
    let mut sorted = latencies_ms.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let percentile = |p: f64| -> f64 {
        let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
        sorted[rank - 1]
    };
    LatencyStats { p50: percentile(0.50), p95: percentile(0.95), p99: percentile(0.99) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub timestamp: String,
    pub total_questions: usize,
    pub passed: usize,
    pub failed: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub category_breakdown: BTreeMap<String, CategoryBreakdown>,
    pub latency_stats: LatencyStats,
}

pub fn accuracy(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

pub fn precision(true_positives: usize, false_positives: usize) -> f64 {
    let denom = true_positives + false_positives;
    if denom == 0 {
        0.0
    } else {
        true_positives as f64 / denom as f64
    }
}

pub fn recall(true_positives: usize, false_negatives: usize) -> f64 {
    let denom = true_positives + false_negatives;
    if denom == 0 {
        0.0
    } else {
        true_positives as f64 / denom as f64
    }
}

pub fn f1_score(precision_val: f64, recall_val: f64) -> f64 {
    let denom = precision_val + recall_val;
    if denom == 0.0 {
        0.0
    } else {
        2.0 * (precision_val * recall_val) / denom
    }
}

/// `serde_json::to_string_pretty`, matching the indent the harness's JSON
/// consumers expect.
pub fn generate_json_report(report: &EvaluationReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn generate_markdown_report(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Memory Evaluation Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "**Timestamp**: {}", report.timestamp);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Total Questions**: {}", report.total_questions);
    let _ = writeln!(out, "- **Passed**: {}", report.passed);
    let _ = writeln!(out, "- **Failed**: {}", report.failed);
    let _ = writeln!(out, "- **Accuracy**: {:.2}%", report.accuracy * 100.0);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Metrics");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Precision**: {:.2}%", report.precision * 100.0);
    let _ = writeln!(out, "- **Recall**: {:.2}%", report.recall * 100.0);
    let _ = writeln!(out, "- **F1 Score**: {:.2}%", report.f1 * 100.0);
    let _ = writeln!(out);

    if !report.category_breakdown.is_empty() {
        let _ = writeln!(out, "## Category Breakdown");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Category | Passed | Failed | Accuracy |");
        let _ = writeln!(out, "|----------|--------|--------|----------|");
        for (category, breakdown) in &report.category_breakdown {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.2}% |",
                category,
                breakdown.passed,
                breakdown.failed,
                breakdown.accuracy * 100.0
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Latency Statistics");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **p50**: {:.2}ms", report.latency_stats.p50);
    let _ = writeln!(out, "- **p95**: {:.2}ms", report.latency_stats.p95);
    let _ = writeln!(out, "- **p99**: {:.2}ms", report.latency_stats.p99);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_recall_f1_match_known_values() {
        assert!((precision(8, 2) - 0.8).abs() < 1e-9);
        assert!((recall(8, 2) - 0.8).abs() < 1e-9);
        assert!((f1_score(0.8, 0.8) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn zero_denominators_return_zero_not_panic() {
        assert_eq!(precision(0, 0), 0.0);
        assert_eq!(recall(0, 0), 0.0);
        assert_eq!(f1_score(0.0, 0.0), 0.0);
        assert_eq!(accuracy(0, 0), 0.0);
    }

    #[test]
    fn latency_stats_nearest_rank_percentiles() {
        let latencies: Vec<f64> = (1..=100).map(|n| n as f64).collect();
        let stats = latency_stats(&latencies);
        assert_eq!(stats.p50, 50.0);
        assert_eq!(stats.p95, 95.0);
        assert_eq!(stats.p99, 99.0);
    }

    #[test]
    fn latency_stats_empty_input_is_zeroed() {
        assert_eq!(latency_stats(&[]), LatencyStats::default());
    }

    #[test]
    fn markdown_report_includes_category_table_when_present() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("factual_recall".to_string(), CategoryBreakdown { passed: 4, failed: 1, accuracy: 0.8 });
        let report = EvaluationReport {
            timestamp: "2026-07-26T00:00:00Z".to_string(),
            total_questions: 5,
            passed: 4,
            failed: 1,
            accuracy: 0.8,
            precision: 1.0,
            recall: 0.8,
            f1: 0.888,
            category_breakdown: breakdown,
            latency_stats: LatencyStats { p50: 10.0, p95: 20.0, p99: 25.0 },
        };
        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("factual_recall"));
        assert!(markdown.contains("p99"));
    }
}
