// ============================================================
// Layer 4 — Episode Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<EpisodeSample>
// into tensors for the model forward pass.
//
// Input:  Vec of N samples, each seq_len * n_channels floats
// Output: EpisodeBatch with features [N, seq_len, n_channels]
//         and targets [N]
//
// All samples in a scenario share the same dimensions, so
// batching is flatten-then-reshape with no dynamic padding.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::EpisodeSample;

/// A batch of episodes ready for the model forward pass.
///
/// B is the Burn Backend — generic so the same batcher serves the
/// autodiff training backend and the plain evaluation backend.
#[derive(Debug, Clone)]
pub struct EpisodeBatch<B: Backend> {
    /// Time-series features — shape: [batch_size, seq_len, n_channels]
    pub features: Tensor<B, 3>,

    /// Outcome labels — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Holds the target device plus the scenario dimensions needed to
/// reshape the flat feature vectors.
#[derive(Debug, Clone)]
pub struct EpisodeBatcher<B: Backend> {
    device: B::Device,
    seq_len: usize,
    n_channels: usize,
}

impl<B: Backend> EpisodeBatcher<B> {
    pub fn new(device: B::Device, seq_len: usize, n_channels: usize) -> Self {
        Self {
            device,
            seq_len,
            n_channels,
        }
    }
}

impl<B: Backend> Batcher<EpisodeSample, EpisodeBatch<B>> for EpisodeBatcher<B> {
    fn batch(&self, items: Vec<EpisodeSample>) -> EpisodeBatch<B> {
        let batch_size = items.len();

        let feature_flat: Vec<f32> = items.iter().flat_map(|s| s.features.iter().copied()).collect();

        let targets_flat: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let features = Tensor::<B, 1>::from_floats(feature_flat.as_slice(), &self.device).reshape([
            batch_size,
            self.seq_len,
            self.n_channels,
        ]);

        let targets = Tensor::<B, 1, Int>::from_ints(targets_flat.as_slice(), &self.device);

        EpisodeBatch { features, targets }
    }
}
