// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types that define the core concepts of the harness.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and their invariants
//
// Keeping this layer pure means the grid arithmetic (space
// merging, trial sampling, result bookkeeping) is testable
// without constructing a single tensor.

// Closed enums over supported models, strategies, optimizers,
// datasets, and demographic split keys
pub mod experiment;

// Hyperparameter spaces, distributions, and sampled trial configs
pub mod search_space;

// Result containers: validation vs training outcomes, results table
pub mod results;
