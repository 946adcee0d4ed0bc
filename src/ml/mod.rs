// ============================================================
// Layer 5 — ML / Training Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one and
// the data pipeline (for the Dataset/Batcher traits).
//
// What's in this layer:
//
//   models.rs    — The five architectures (MLP, CNN, RNN, LSTM,
//                  Transformer) behind one SequenceClassifier
//                  trait, with the sizing policies the benchmark
//                  depends on (depth-0 widths, pooling guard,
//                  attention head resolution)
//
//   strategy.rs  — Continual-learning strategy construction:
//                  optimizer selection, experience scheduling
//                  (Naive/Cumulative/Replay) and the previous-model
//                  penalty family (EWC/SI/LwF)
//
//   trainer.rs   — The training loop driver: one experience after
//                  another, per-epoch evaluation, and the two
//                  metric-extraction paths (validation vs full
//                  training)
//
//   evaluator.rs — Metric accumulation with stream/per-experience
//                  keys and the versioned key fallback

/// Architectures and the model factory
pub mod models;

/// Strategy plans, optimizer selection, replay buffer
pub mod strategy;

/// The sequential training loop driver
pub mod trainer;

/// Metric accumulation and extraction
pub mod evaluator;
