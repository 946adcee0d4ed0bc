// ============================================================
// Layer 3 — Result Containers
// ============================================================
// The training loop driver has two distinct metric-extraction
// paths, and they return differently shaped data:
//
//   - validation runs end with one explicit eval pass and reduce
//     to a single (loss, accuracy) pair;
//   - full training runs return every metric curve the evaluator
//     accumulated along the way.
//
// Modelling these as two variants of TrainOutcome (instead of one
// dynamically-keyed map) means a caller cannot read a validation
// result as if it carried per-task curves, or vice versa.
//
// The ResultsTable is the only shared container in the harness.
// It records the dataset, outcome, domain, and run timestamp it
// was created for, so every populated cell is guaranteed to be
// cross-comparable in plots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::search_space::TrialConfig;

// ─── Metric curves ────────────────────────────────────────────────────────────

/// One named metric over training time: parallel step/value series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCurve {
    pub steps: Vec<usize>,
    pub values: Vec<f64>,
}

impl MetricCurve {
    pub fn push(&mut self, step: usize, value: f64) {
        self.steps.push(step);
        self.values.push(value);
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

// ─── Training loop outcomes ───────────────────────────────────────────────────

/// Scalar result of a validation run: the final eval pass over the
/// held-out stream, reduced to the two numbers the tuner reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub loss: f64,
    pub accuracy: f64,
}

/// Full result of a training run: every metric curve accumulated
/// by the evaluator, keyed by its metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub metrics: BTreeMap<String, MetricCurve>,
}

impl TrainingResult {
    pub fn curve(&self, key: &str) -> Option<&MetricCurve> {
        self.metrics.get(key)
    }

    /// Final recorded value of a metric, if the curve exists and
    /// is non-empty.
    pub fn final_value(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(MetricCurve::last)
    }

    /// Curves whose key starts with the given prefix, in key order.
    pub fn curves_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a MetricCurve)> {
        self.metrics.iter().filter(move |(k, _)| k.starts_with(prefix))
    }
}

/// What one invocation of the training loop driver produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainOutcome {
    Validation(ValidationResult),
    Training(TrainingResult),
}

// ─── Results table ────────────────────────────────────────────────────────────

/// What a completed (model, strategy) pair contributed: the best
/// configuration found by search, or the raw training metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairOutcome {
    BestConfig(TrialConfig),
    Metrics(TrainingResult),
}

/// Nested mapping model name -> strategy name -> outcome, tagged
/// with the run context every cell was produced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub data: String,
    pub outcome: String,
    pub domain: String,
    pub timestamp: String,
    pub cells: BTreeMap<String, BTreeMap<String, PairOutcome>>,
}

impl ResultsTable {
    pub fn new(data: &str, outcome: &str, domain: &str, timestamp: &str) -> Self {
        Self {
            data: data.to_string(),
            outcome: outcome.to_string(),
            domain: domain.to_string(),
            timestamp: timestamp.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, model: &str, strategy: &str, outcome: PairOutcome) {
        self.cells
            .entry(model.to_string())
            .or_default()
            .insert(strategy.to_string(), outcome);
    }

    pub fn get(&self, model: &str, strategy: &str) -> Option<&PairOutcome> {
        self.cells.get(model).and_then(|row| row.get(strategy))
    }

    pub fn pair_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &String> {
        self.cells.keys()
    }

    /// Strategy names of the first populated row. Rows are filled
    /// from the same strategy list, so any row is representative.
    pub fn strategy_names(&self) -> Vec<String> {
        self.cells
            .values()
            .next()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_records_and_counts_pairs() {
        let mut table = ResultsTable::new("random", "mortality", "region", "2024-01-01-00-00-00");
        table.record("MLP", "Naive", PairOutcome::Metrics(TrainingResult::default()));
        table.record("MLP", "Replay", PairOutcome::Metrics(TrainingResult::default()));
        table.record("CNN", "Naive", PairOutcome::Metrics(TrainingResult::default()));

        assert_eq!(table.pair_count(), 3);
        assert!(table.get("MLP", "Replay").is_some());
        assert!(table.get("CNN", "Replay").is_none());
        assert_eq!(table.strategy_names(), vec!["Naive".to_string(), "Replay".to_string()]);
    }

    #[test]
    fn final_value_reads_last_point() {
        let mut curve = MetricCurve::default();
        curve.push(0, 0.4);
        curve.push(1, 0.7);
        let mut result = TrainingResult::default();
        result.metrics.insert("acc".into(), curve);

        assert_eq!(result.final_value("acc"), Some(0.7));
        assert_eq!(result.final_value("missing"), None);
    }
}
