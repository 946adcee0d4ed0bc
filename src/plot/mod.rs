// ============================================================
// Layer 7 — Figure Rendering
// ============================================================
// Renders every comparison figure a results table supports into a
// timestamped figure directory:
//
//   figs/{data}/{outcome}/{domain}/{timestamp}/
//     Exp_{stream}_{metric}.png     per-experience curves
//     Stream_{stream}_{metric}.png  stream-level curves
//     Final_{stream}_{metric}.png   final-performance bars
//
// Figures are only written for (stream, metric) combinations that
// actually have curves, so a table from a search-only run renders
// nothing rather than a sheet of empty frames.

pub mod canvas;
pub mod charts;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::results::ResultsTable;
use crate::infra::paths::RunPaths;
use crate::ml::evaluator::{StreamId, METRIC_ACC, METRIC_LOSS};

/// Render all supported figures; returns the figure directory.
pub fn render_all(table: &ResultsTable, paths: &RunPaths, timestamp: &str) -> Result<PathBuf> {
    let fig_dir = paths.fig_dir(&table.data, &table.outcome, &table.domain, timestamp);
    fs::create_dir_all(&fig_dir)
        .with_context(|| format!("creating figure directory '{}'", fig_dir.display()))?;

    for stream in [StreamId::Test, StreamId::Train] {
        for metric in [METRIC_ACC, METRIC_LOSS] {
            if !charts::has_curves(table, stream, metric) {
                continue;
            }
            let exp_path = fig_dir.join(format!("Exp_{}_{metric}.png", stream.as_str()));
            charts::render_exp_grid(table, stream, metric, &exp_path)?;

            let stream_path = fig_dir.join(format!("Stream_{}_{metric}.png", stream.as_str()));
            charts::render_stream_grid(table, stream, metric, &stream_path)?;

            let bars_path = fig_dir.join(format!("Final_{}_{metric}.png", stream.as_str()));
            charts::render_final_bars(table, stream, metric, &bars_path)?;

            tracing::info!(
                "Rendered {} / {} figures for the {} stream",
                exp_path.display(),
                stream_path.display(),
                stream.as_str()
            );
        }
    }

    Ok(fig_dir)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::results::{MetricCurve, PairOutcome, TrainingResult};
    use crate::ml::evaluator::{exp_key, stream_key};
    use std::path::Path;

    fn populated_table() -> ResultsTable {
        let mut result = TrainingResult::default();
        for metric in [METRIC_ACC, METRIC_LOSS] {
            let mut curve = MetricCurve::default();
            curve.push(0, 0.5);
            curve.push(1, 0.4);
            result
                .metrics
                .insert(stream_key(metric, StreamId::Test), curve.clone());
            result
                .metrics
                .insert(exp_key(metric, StreamId::Test, 0), curve);
        }

        let mut table = ResultsTable::new("random", "mortality", "region", "ts");
        table.record("MLP", "Naive", PairOutcome::Metrics(result));
        table
    }

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("clinical-cl-plot-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn render_all_writes_test_stream_figures() {
        let root = temp_root("render");
        let paths = RunPaths::new(&root);
        let table = populated_table();

        let fig_dir = render_all(&table, &paths, "2024-01-01-00-00-00").unwrap();
        assert_eq!(
            fig_dir,
            Path::new(&root).join("results/figs/random/mortality/region/2024-01-01-00-00-00")
        );
        assert!(fig_dir.join("Exp_test_Top1_Acc.png").exists());
        assert!(fig_dir.join("Stream_test_Top1_Acc.png").exists());
        assert!(fig_dir.join("Exp_test_Loss.png").exists());
        assert!(fig_dir.join("Final_test_Top1_Acc.png").exists());
        // No train-stream curves were recorded, so no train figures.
        assert!(!fig_dir.join("Exp_train_Top1_Acc.png").exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn search_only_tables_render_no_figures() {
        let root = temp_root("empty");
        let paths = RunPaths::new(&root);
        let mut table = ResultsTable::new("random", "mortality", "region", "ts");
        table.record("MLP", "Naive", PairOutcome::BestConfig(Default::default()));

        let fig_dir = render_all(&table, &paths, "2024-01-01-00-00-00").unwrap();
        let entries: Vec<_> = fs::read_dir(&fig_dir).unwrap().collect();
        assert!(entries.is_empty());

        fs::remove_dir_all(&root).unwrap();
    }
}
