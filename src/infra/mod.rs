// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Filesystem concerns: the run directory tree, the per-run metric
// sink, and JSON persistence for results and tuned configurations.
// Nothing here knows about models or strategies beyond their names.

/// The run directory tree and run timestamps
pub mod paths;

/// Per-run CSV metric sink
pub mod metric_sink;

/// Results table and best-config persistence
pub mod results_store;
