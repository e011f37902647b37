//! Golden-set evaluation runner (component T).
//!
//! `retrieve_fn` and `evaluate_fn` are provided by the caller so this crate
//! stays decoupled from any particular `memory-retrieval` wiring: the
//! harness only needs the golden set and two closures.

use std::collections::BTreeMap;
use std::time::Instant;

use memory_core::{EntityIdType, Memory};

use crate::golden::{GoldenQuestion, GoldenSet};
use crate::report::{
    accuracy, f1_score, latency_stats, precision, recall, CategoryBreakdown, EvaluationReport,
};

/// Outcome of one golden question, retained for callers that want the raw
/// per-question detail rather than just the aggregate report.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub category: String,
    pub success: bool,
    pub retrieved: Vec<Memory>,
    pub latency_ms: f64,
}

#[derive(Default)]
pub struct EvaluationHarness {
    golden_set: Option<GoldenSet>,
}

impl EvaluationHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_golden_set(golden_set: GoldenSet) -> Self {
        Self { golden_set: Some(golden_set) }
    }

    pub fn load_golden_set(&mut self, golden_set: GoldenSet) {
        self.golden_set = Some(golden_set);
    }

    pub fn questions(&self) -> &[GoldenQuestion] {
        self.golden_set.as_ref().map(|g| g.questions.as_slice()).unwrap_or(&[])
    }

    /// Run every question in the loaded golden set.
    ///
    /// `evaluate_fn` absent means every question is scored wrong: there is
    /// no way to tell success from failure without a judge.
    pub fn run<R, E>(&self, retrieve_fn: R, evaluate_fn: Option<E>) -> EvaluationReport
    where
        R: Fn(&GoldenQuestion) -> Vec<Memory>,
        E: Fn(&GoldenQuestion, &[Memory]) -> bool,
    {
        run_questions(self.questions(), retrieve_fn, evaluate_fn)
    }

    /// Run only the questions tagged with `category`.
    pub fn run_category<R, E>(&self, category: &str, retrieve_fn: R, evaluate_fn: Option<E>) -> EvaluationReport
    where
        R: Fn(&GoldenQuestion) -> Vec<Memory>,
        E: Fn(&GoldenQuestion, &[Memory]) -> bool,
    {
        let filtered: Vec<GoldenQuestion> = self
            .golden_set
            .as_ref()
            .map(|g| g.filtered_by_category(category).into_iter().cloned().collect())
            .unwrap_or_default();
        run_questions(&filtered, retrieve_fn, evaluate_fn)
    }
}

fn run_questions<R, E>(questions: &[GoldenQuestion], retrieve_fn: R, evaluate_fn: Option<E>) -> EvaluationReport
where
    R: Fn(&GoldenQuestion) -> Vec<Memory>,
    E: Fn(&GoldenQuestion, &[Memory]) -> bool,
{
    let mut outcomes = Vec::with_capacity(questions.len());
    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut true_positives = 0usize;
    let mut false_positives = 0usize;
    let mut false_negatives = 0usize;
    let mut category_counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for question in questions {
        let start = Instant::now();
        let retrieved = retrieve_fn(question);
        let success = match &evaluate_fn {
            Some(evaluate) => evaluate(question, &retrieved),
            None => false,
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        if success {
            passed += 1;
            true_positives += 1;
        } else {
            failed += 1;
            if retrieved.is_empty() {
                false_negatives += 1;
            } else {
                false_positives += 1;
            }
        }

        let entry = category_counts.entry(question.category.clone()).or_insert((0, 0));
        if success {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }

        outcomes.push(QuestionOutcome {
            question_id: question.id.clone(),
            category: question.category.clone(),
            success,
            retrieved,
            latency_ms,
        });
    }

    let total = questions.len();
    let category_breakdown = category_counts
        .into_iter()
        .map(|(category, (cat_passed, cat_failed))| {
            let cat_total = cat_passed + cat_failed;
            let breakdown = CategoryBreakdown { passed: cat_passed, failed: cat_failed, accuracy: accuracy(cat_passed, cat_total) };
            (category, breakdown)
        })
        .collect();

    let latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_ms).collect();

    EvaluationReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        total_questions: total,
        passed,
        failed,
        accuracy: accuracy(passed, total),
        precision: precision(true_positives, false_positives),
        recall: recall(true_positives, false_negatives),
        f1: f1_score(precision(true_positives, false_positives), recall(true_positives, false_negatives)),
        category_breakdown,
        latency_stats: latency_stats(&latencies),
    }
}
