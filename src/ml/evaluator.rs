// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Accumulates evaluation results into named metric curves and owns
// the metric key grammar:
//
//   Stream-level:   {metric}_Stream/eval_phase/{mode}_stream
//   Per-experience: {metric}_Exp/eval_phase/{mode}_stream/Exp{NNN}
//
// The final eval pass of a validation run reports its stream
// metrics under task-qualified keys ({key}/Task000), so extraction
// goes through metric_with_fallback: the unqualified key first,
// then the qualified form. A key absent in both spellings is an
// error, not a silent zero.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::domain::results::{MetricCurve, TrainingResult};

pub const METRIC_ACC: &str = "Top1_Acc";
pub const METRIC_LOSS: &str = "Loss";

/// Which stream an eval pass ran over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    Train,
    Test,
}

impl StreamId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamId::Train => "train",
            StreamId::Test => "test",
        }
    }
}

/// Stream-level metric key.
pub fn stream_key(metric: &str, stream: StreamId) -> String {
    format!("{metric}_Stream/eval_phase/{}_stream", stream.as_str())
}

/// Per-experience metric key.
pub fn exp_key(metric: &str, stream: StreamId, task_id: usize) -> String {
    format!(
        "{metric}_Exp/eval_phase/{}_stream/Exp{task_id:03}",
        stream.as_str()
    )
}

// ─── Eval pass results ────────────────────────────────────────────────────────

/// Metrics of one experience within an eval pass.
#[derive(Debug, Clone)]
pub struct ExpEval {
    pub task_id: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub n_samples: usize,
}

/// One full eval pass: per-experience metrics plus the
/// sample-weighted stream aggregate.
#[derive(Debug, Clone)]
pub struct StreamEval {
    pub per_exp: Vec<ExpEval>,
    pub loss: f64,
    pub accuracy: f64,
}

impl StreamEval {
    pub fn from_experiences(per_exp: Vec<ExpEval>) -> Self {
        let total: usize = per_exp.iter().map(|e| e.n_samples).sum();
        let (loss, accuracy) = if total == 0 {
            (f64::NAN, 0.0)
        } else {
            let weight = |n: usize| n as f64 / total as f64;
            (
                per_exp.iter().map(|e| e.loss * weight(e.n_samples)).sum(),
                per_exp.iter().map(|e| e.accuracy * weight(e.n_samples)).sum(),
            )
        };
        Self { per_exp, loss, accuracy }
    }
}

// ─── Curve accumulation ───────────────────────────────────────────────────────

/// Collects eval passes over the course of a run into metric
/// curves, one curve per key.
#[derive(Debug, Default)]
pub struct Evaluator {
    curves: BTreeMap<String, MetricCurve>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one eval pass at the given step.
    pub fn record(&mut self, step: usize, stream: StreamId, eval: &StreamEval) {
        self.push(stream_key(METRIC_LOSS, stream), step, eval.loss);
        self.push(stream_key(METRIC_ACC, stream), step, eval.accuracy);
        for exp in &eval.per_exp {
            self.push(exp_key(METRIC_LOSS, stream, exp.task_id), step, exp.loss);
            self.push(exp_key(METRIC_ACC, stream, exp.task_id), step, exp.accuracy);
        }
    }

    fn push(&mut self, key: String, step: usize, value: f64) {
        self.curves.entry(key).or_default().push(step, value);
    }

    pub fn into_result(self) -> TrainingResult {
        TrainingResult { metrics: self.curves }
    }
}

// ─── Final extraction ─────────────────────────────────────────────────────────

/// Flatten the final eval pass into a scalar map. Stream-level
/// entries carry the task-qualified key form.
pub fn final_metrics(eval: &StreamEval, stream: StreamId) -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    map.insert(format!("{}/Task000", stream_key(METRIC_LOSS, stream)), eval.loss);
    map.insert(format!("{}/Task000", stream_key(METRIC_ACC, stream)), eval.accuracy);
    for exp in &eval.per_exp {
        map.insert(exp_key(METRIC_LOSS, stream, exp.task_id), exp.loss);
        map.insert(exp_key(METRIC_ACC, stream, exp.task_id), exp.accuracy);
    }
    map
}

/// Look a metric up under its unqualified key, then under the
/// task-qualified form.
pub fn metric_with_fallback(map: &BTreeMap<String, f64>, key: &str) -> Result<f64> {
    map.get(key)
        .or_else(|| map.get(&format!("{key}/Task000")))
        .copied()
        .ok_or_else(|| anyhow!("metric '{key}' missing in both unqualified and task-qualified form"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn eval_of(per_exp: Vec<(usize, f64, f64, usize)>) -> StreamEval {
        StreamEval::from_experiences(
            per_exp
                .into_iter()
                .map(|(task_id, loss, accuracy, n_samples)| ExpEval {
                    task_id,
                    loss,
                    accuracy,
                    n_samples,
                })
                .collect(),
        )
    }

    #[test]
    fn stream_aggregate_is_sample_weighted() {
        let eval = eval_of(vec![(0, 1.0, 1.0, 30), (1, 0.0, 0.0, 10)]);
        assert!((eval.loss - 0.75).abs() < 1e-12);
        assert!((eval.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn key_grammar_matches_expected_forms() {
        assert_eq!(
            stream_key(METRIC_ACC, StreamId::Test),
            "Top1_Acc_Stream/eval_phase/test_stream"
        );
        assert_eq!(
            exp_key(METRIC_LOSS, StreamId::Train, 3),
            "Loss_Exp/eval_phase/train_stream/Exp003"
        );
    }

    #[test]
    fn evaluator_accumulates_stream_and_exp_curves() {
        let mut evaluator = Evaluator::new();
        evaluator.record(0, StreamId::Test, &eval_of(vec![(0, 0.9, 0.5, 10)]));
        evaluator.record(1, StreamId::Test, &eval_of(vec![(0, 0.7, 0.6, 10)]));
        let result = evaluator.into_result();

        let stream = result.curve(&stream_key(METRIC_LOSS, StreamId::Test)).unwrap();
        assert_eq!(stream.steps, vec![0, 1]);
        assert_eq!(stream.values, vec![0.9, 0.7]);
        assert!(result.curve(&exp_key(METRIC_ACC, StreamId::Test, 0)).is_some());
    }

    #[test]
    fn fallback_reads_the_task_qualified_key() {
        let eval = eval_of(vec![(0, 0.4, 0.8, 20)]);
        let map = final_metrics(&eval, StreamId::Test);

        // The unqualified stream key is absent; the qualified form
        // must be found through the fallback.
        let base = stream_key(METRIC_LOSS, StreamId::Test);
        assert!(!map.contains_key(&base));
        assert!((metric_with_fallback(&map, &base).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn fallback_prefers_the_unqualified_key() {
        let mut map = BTreeMap::new();
        map.insert("Loss_Stream/eval_phase/test_stream".to_string(), 0.1);
        map.insert("Loss_Stream/eval_phase/test_stream/Task000".to_string(), 0.9);
        let value = metric_with_fallback(&map, "Loss_Stream/eval_phase/test_stream").unwrap();
        assert!((value - 0.1).abs() < 1e-12);
    }

    #[test]
    fn missing_metric_is_an_error() {
        let map = BTreeMap::new();
        assert!(metric_with_fallback(&map, "Loss_Stream/eval_phase/test_stream").is_err());
    }
}
