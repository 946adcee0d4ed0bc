// ============================================================
// Layer 2 — Application Layer
// ============================================================
// Orchestration above the ML layer: the hyperparameter search
// driver and the run controller that walks the model x strategy
// grid. This layer owns no tensors — it schedules trials, moves
// configurations around, and persists outcomes.

/// Hyperparameter search: the Tuner seam and the sampling driver
pub mod search;

/// The model x strategy grid walker
pub mod run_controller;
