use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One patient episode: a fixed-length multichannel time series
/// plus a binary outcome label.
///
/// Features are stored row-major as [timestep][channel], already
/// padded/truncated to the scenario's sequence length, so the
/// batcher can flatten and reshape without per-sample bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSample {
    pub features: Vec<f32>,
    pub label: usize,
}

impl EpisodeSample {
    pub fn new(features: Vec<f32>, label: usize) -> Self {
        Self { features, label }
    }
}

/// The sample set of a single experience, behind Burn's Dataset
/// trait so the DataLoader can call .get(index) and .len() on it.
pub struct ExperienceDataset {
    samples: Vec<EpisodeSample>,
}

impl ExperienceDataset {
    pub fn new(samples: Vec<EpisodeSample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<EpisodeSample> for ExperienceDataset {
    fn get(&self, index: usize) -> Option<EpisodeSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
