// ============================================================
// Layer 7 — Comparison Charts
// ============================================================
// Renders the two figure families from a results table:
//
//   Exp_{stream}_{metric}.png    — a model x strategy grid of
//     cells, each cell plotting the per-experience curves of that
//     pair (one color per task);
//   Stream_{stream}_{metric}.png — the stream-level curve of each
//     strategy, one grid row per model.
//
// Loss axes are fixed to [0, 2]; accuracy axes to [0, 1], so every
// cell of one figure is directly comparable.

use std::path::Path;

use anyhow::Result;

use crate::domain::results::{MetricCurve, PairOutcome, ResultsTable, TrainingResult};
use crate::ml::evaluator::{exp_key, stream_key, StreamId, METRIC_LOSS};
use crate::plot::canvas::{Canvas, BLACK, GRID_GRAY, PALETTE};

const CELL_W: i64 = 220;
const CELL_H: i64 = 160;
const MARGIN: i64 = 40;
const GUTTER: i64 = 12;
const CELL_PAD: i64 = 8;

fn y_range(metric: &str) -> (f64, f64) {
    if metric == METRIC_LOSS {
        (0.0, 2.0)
    } else {
        (0.0, 1.0)
    }
}

fn metrics_of(outcome: &PairOutcome) -> Option<&TrainingResult> {
    match outcome {
        PairOutcome::Metrics(result) => Some(result),
        PairOutcome::BestConfig(_) => None,
    }
}

fn curve_points(curve: &MetricCurve) -> Vec<(f64, f64)> {
    curve
        .steps
        .iter()
        .zip(curve.values.iter())
        .map(|(&step, &value)| (step as f64, value))
        .collect()
}

fn max_step(table: &ResultsTable) -> f64 {
    table
        .cells
        .values()
        .flat_map(|row| row.values())
        .filter_map(metrics_of)
        .flat_map(|result| result.metrics.values())
        .flat_map(|curve| curve.steps.last().copied())
        .max()
        .unwrap_or(1) as f64
}

/// Whether any cell holds curves for this metric and stream.
pub fn has_curves(table: &ResultsTable, stream: StreamId, metric: &str) -> bool {
    let prefix = stream_key(metric, stream);
    table
        .cells
        .values()
        .flat_map(|row| row.values())
        .filter_map(metrics_of)
        .any(|result| result.curves_with_prefix(&prefix).next().is_some())
}

struct Grid {
    n_rows: usize,
    n_cols: usize,
}

impl Grid {
    fn of(table: &ResultsTable) -> Self {
        Self {
            n_rows: table.cells.len().max(1),
            n_cols: table.strategy_names().len().max(1),
        }
    }

    fn canvas(&self) -> Canvas {
        let width = 2 * MARGIN + self.n_cols as i64 * CELL_W + (self.n_cols as i64 - 1) * GUTTER;
        let height = 2 * MARGIN + self.n_rows as i64 * CELL_H + (self.n_rows as i64 - 1) * GUTTER;
        Canvas::new(width as u32, height as u32)
    }

    fn cell_origin(&self, row: usize, col: usize) -> (i64, i64) {
        (
            MARGIN + col as i64 * (CELL_W + GUTTER),
            MARGIN + row as i64 * (CELL_H + GUTTER),
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_cell_curves(
    canvas: &mut Canvas,
    origin: (i64, i64),
    curves: &[&MetricCurve],
    x_max: f64,
    range: (f64, f64),
) {
    let (x, y) = origin;
    canvas.rect(x, y, CELL_W, CELL_H, BLACK);

    // Horizontal midline as a reading aid.
    let mid = y + CELL_H / 2;
    canvas.line(x + 1, mid, x + CELL_W - 2, mid, GRID_GRAY);

    for (index, curve) in curves.iter().enumerate() {
        canvas.polyline(
            x + CELL_PAD,
            y + CELL_PAD,
            CELL_W - 2 * CELL_PAD,
            CELL_H - 2 * CELL_PAD,
            &curve_points(curve),
            x_max,
            range,
            PALETTE[index % PALETTE.len()],
        );
    }
}

/// Per-experience figure: each cell plots one (model, strategy)
/// pair, one colored curve per task.
pub fn render_exp_grid(
    table: &ResultsTable,
    stream: StreamId,
    metric: &str,
    out_path: &Path,
) -> Result<()> {
    let grid = Grid::of(table);
    let mut canvas = grid.canvas();
    let x_max = max_step(table);
    let range = y_range(metric);
    let strategies = table.strategy_names();

    for (row, model) in table.model_names().enumerate() {
        for (col, strategy) in strategies.iter().enumerate() {
            let Some(result) = table.get(model, strategy).and_then(metrics_of) else {
                continue;
            };
            // Experience keys share the metric/stream prefix and
            // differ only in their ExpNNN suffix.
            let prefix = exp_key(metric, stream, 0);
            let prefix = &prefix[..prefix.len() - 3];
            let curves: Vec<&MetricCurve> =
                result.curves_with_prefix(prefix).map(|(_, c)| c).collect();
            draw_cell_curves(&mut canvas, grid.cell_origin(row, col), &curves, x_max, range);
        }
    }

    canvas.save(out_path)
}

/// Stream-level figure: each cell plots the single stream curve of
/// one (model, strategy) pair.
pub fn render_stream_grid(
    table: &ResultsTable,
    stream: StreamId,
    metric: &str,
    out_path: &Path,
) -> Result<()> {
    let grid = Grid::of(table);
    let mut canvas = grid.canvas();
    let x_max = max_step(table);
    let range = y_range(metric);
    let strategies = table.strategy_names();
    let key = stream_key(metric, stream);

    for (row, model) in table.model_names().enumerate() {
        for (col, strategy) in strategies.iter().enumerate() {
            let Some(result) = table.get(model, strategy).and_then(metrics_of) else {
                continue;
            };
            let curves: Vec<&MetricCurve> = result.curve(&key).into_iter().collect();
            draw_cell_curves(&mut canvas, grid.cell_origin(row, col), &curves, x_max, range);
        }
    }

    canvas.save(out_path)
}

/// Final-performance figure: one bar per (model, strategy) pair,
/// grouped by model, showing the last recorded stream-level value.
pub fn render_final_bars(
    table: &ResultsTable,
    stream: StreamId,
    metric: &str,
    out_path: &Path,
) -> Result<()> {
    const BAR_W: i64 = 28;
    const BAR_GAP: i64 = 6;
    const GROUP_GAP: i64 = 24;
    const PLOT_H: i64 = 220;

    let strategies = table.strategy_names();
    let n_models = table.cells.len().max(1) as i64;
    let n_strategies = strategies.len().max(1) as i64;
    let group_w = n_strategies * (BAR_W + BAR_GAP);
    let width = 2 * MARGIN + n_models * group_w + (n_models - 1) * GROUP_GAP;
    let height = 2 * MARGIN + PLOT_H;

    let mut canvas = Canvas::new(width as u32, height as u32);
    let (y_lo, y_hi) = y_range(metric);
    let key = stream_key(metric, stream);
    let baseline = MARGIN + PLOT_H;

    canvas.line(MARGIN, baseline, width - MARGIN, baseline, BLACK);

    for (group, model) in table.model_names().enumerate() {
        let group_x = MARGIN + group as i64 * (group_w + GROUP_GAP);
        for (index, strategy) in strategies.iter().enumerate() {
            let Some(value) = table
                .get(model, strategy)
                .and_then(metrics_of)
                .and_then(|result| result.final_value(&key))
            else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }
            let clamped = value.clamp(y_lo, y_hi);
            let bar_h = (((clamped - y_lo) / (y_hi - y_lo)) * PLOT_H as f64).round() as i64;
            let x = group_x + index as i64 * (BAR_W + BAR_GAP);
            canvas.fill_rect(
                x,
                baseline - bar_h,
                BAR_W,
                bar_h,
                PALETTE[index % PALETTE.len()],
            );
            canvas.rect(x, baseline - bar_h, BAR_W, bar_h.max(1), BLACK);
        }
    }

    canvas.save(out_path)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::evaluator::METRIC_ACC;
    use std::fs;
    use std::path::PathBuf;

    fn table_with_curves() -> ResultsTable {
        let mut result = TrainingResult::default();

        let mut stream_curve = MetricCurve::default();
        stream_curve.push(0, 0.5);
        stream_curve.push(1, 0.6);
        result
            .metrics
            .insert(stream_key(METRIC_ACC, StreamId::Test), stream_curve);

        for task in 0..3 {
            let mut curve = MetricCurve::default();
            curve.push(0, 0.4 + task as f64 * 0.1);
            curve.push(1, 0.5 + task as f64 * 0.1);
            result
                .metrics
                .insert(exp_key(METRIC_ACC, StreamId::Test, task), curve);
        }

        let mut table = ResultsTable::new("random", "mortality", "region", "ts");
        table.record("MLP", "Naive", PairOutcome::Metrics(result));
        table
    }

    fn temp_png(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("clinical-cl-chart-{tag}-{}.png", std::process::id()))
    }

    #[test]
    fn loss_axis_is_wider_than_accuracy_axis() {
        assert_eq!(y_range(METRIC_LOSS), (0.0, 2.0));
        assert_eq!(y_range(METRIC_ACC), (0.0, 1.0));
    }

    #[test]
    fn has_curves_reflects_table_contents() {
        let table = table_with_curves();
        assert!(has_curves(&table, StreamId::Test, METRIC_ACC));
        assert!(!has_curves(&table, StreamId::Test, METRIC_LOSS));
        assert!(!has_curves(&table, StreamId::Train, METRIC_ACC));
    }

    #[test]
    fn search_only_tables_have_no_curves() {
        let mut table = ResultsTable::new("random", "mortality", "region", "ts");
        table.record(
            "MLP",
            "Naive",
            PairOutcome::BestConfig(Default::default()),
        );
        assert!(!has_curves(&table, StreamId::Test, METRIC_ACC));
    }

    #[test]
    fn exp_grid_renders_a_file() {
        let table = table_with_curves();
        let path = temp_png("exp");
        render_exp_grid(&table, StreamId::Test, METRIC_ACC, &path).unwrap();
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn stream_grid_renders_a_file() {
        let table = table_with_curves();
        let path = temp_png("stream");
        render_stream_grid(&table, StreamId::Test, METRIC_ACC, &path).unwrap();
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn final_bars_render_a_file() {
        let table = table_with_curves();
        let path = temp_png("bars");
        render_final_bars(&table, StreamId::Test, METRIC_ACC, &path).unwrap();
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }
}
