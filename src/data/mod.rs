// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a dataset name and GPU-ready tensor batches.
//
// The pipeline flows in this order:
//
//   dataset name
//       │
//       ▼
//   loader            → builds the task-partitioned scenario
//       │                (n_tasks, n_timesteps, n_channels)
//       ▼
//   Scenario          → ordered experiences with train/test splits
//       │
//       ▼
//   ExperienceDataset → implements Burn's Dataset trait
//       │
//       ▼
//   EpisodeBatcher    → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// A Scenario is constructed fresh per run and owned by nobody —
// the training loop driver only borrows it.

/// Builds scenarios from named datasets
pub mod loader;

/// Experiences, streams, and the scenario container
pub mod scenario;

/// Sample type and Burn's Dataset trait implementation
pub mod dataset;

/// Burn Batcher implementation producing tensor batches
pub mod batcher;
