// ============================================================
// Layer 2 — Hyperparameter Search
// ============================================================
// Random search over a merged hyperparameter space. The scheduler
// seam is the Tuner trait: the driver samples configurations,
// names trials, submits them, and keeps the lowest-loss report.
// How a trial actually runs (in-process here, potentially
// elsewhere) is the tuner's business; the driver never sees a
// model or a tensor.
//
// Every submitted trial leaves a JSON artifact (name, config,
// report) in the search directory, so a crashed search is
// inspectable trial by trial.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::domain::experiment::{DatasetKind, DemographicKey, ModelKind, StrategyKind};
use crate::domain::results::TrainOutcome;
use crate::domain::search_space::{SearchSpace, TrialConfig};
use crate::infra::paths::RunPaths;
use crate::ml::trainer::{self, TrainSettings};

/// Knobs of the search itself.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub num_samples: usize,
    /// Resource hint carried through to scheduling; the in-process
    /// tuner only reports it.
    pub cpus_per_trial: usize,
    pub seed: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            num_samples: 20,
            cpus_per_trial: 4,
            seed: 42,
        }
    }
}

/// What one finished trial reported back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub loss: f64,
    pub accuracy: f64,
}

/// The winning trial of one search.
#[derive(Debug, Clone)]
pub struct BestTrial {
    pub name: String,
    pub config: TrialConfig,
    pub report: TrialReport,
}

/// Scheduler seam: runs one named trial to completion.
pub trait Tuner {
    fn submit(&mut self, trial_name: &str, config: &TrialConfig) -> Result<TrialReport>;
}

/// In-process tuner: each submitted trial is one validation-mode
/// pass of the training loop, run to completion before the next
/// trial is sampled.
pub struct LocalTuner<'a> {
    pub data: DatasetKind,
    pub demo: DemographicKey,
    pub model: ModelKind,
    pub strategy: StrategyKind,
    pub timestamp: &'a str,
    pub paths: &'a RunPaths,
    pub train: &'a TrainSettings,
}

impl Tuner for LocalTuner<'_> {
    fn submit(&mut self, trial_name: &str, config: &TrialConfig) -> Result<TrialReport> {
        let outcome = trainer::training_loop(
            config,
            self.data,
            self.demo,
            self.model,
            self.strategy,
            self.timestamp,
            true,
            self.paths,
            self.train,
        )
        .with_context(|| format!("trial '{trial_name}'"))?;

        match outcome {
            TrainOutcome::Validation(result) => Ok(TrialReport {
                loss: result.loss,
                accuracy: result.accuracy,
            }),
            TrainOutcome::Training(_) => {
                bail!("trial '{trial_name}' returned training curves where a validation result was expected")
            }
        }
    }
}

/// Trial names are {trainable}_{index}, zero-padded so listings
/// sort in submission order.
pub fn trial_name(trainable: &str, index: usize) -> String {
    format!("{trainable}_{index:05}")
}

#[derive(Serialize)]
struct TrialArtifact<'a> {
    name: &'a str,
    config: &'a TrialConfig,
    report: &'a TrialReport,
}

/// Drive one search: sample, submit, keep the lowest-loss trial.
pub fn hyperparam_opt(
    space: &SearchSpace,
    tuner: &mut dyn Tuner,
    trainable: &str,
    settings: &SearchSettings,
    artifact_dir: &Path,
) -> Result<BestTrial> {
    if settings.num_samples == 0 {
        bail!("search for '{trainable}' requested zero samples");
    }
    fs::create_dir_all(artifact_dir)
        .with_context(|| format!("creating search directory '{}'", artifact_dir.display()))?;

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut best: Option<BestTrial> = None;

    for index in 0..settings.num_samples {
        let config = space
            .sample(&mut rng)
            .with_context(|| format!("sampling trial {index} for '{trainable}'"))?;
        let name = trial_name(trainable, index);

        tracing::info!(
            "Submitting trial '{}' ({} cpu(s) per trial)",
            name,
            settings.cpus_per_trial
        );
        let report = tuner.submit(&name, &config)?;
        tracing::info!(
            "Trial '{}' finished: loss {:.4}, accuracy {:.4}",
            name,
            report.loss,
            report.accuracy
        );

        let artifact = TrialArtifact {
            name: &name,
            config: &config,
            report: &report,
        };
        let artifact_path = artifact_dir.join(format!("{name}.json"));
        fs::write(&artifact_path, serde_json::to_string_pretty(&artifact)?)
            .with_context(|| format!("writing trial artifact '{}'", artifact_path.display()))?;

        let improves = best
            .as_ref()
            .map_or(true, |current| report.loss < current.report.loss);
        if improves {
            best = Some(BestTrial { name, config, report });
        }
    }

    let best = best.ok_or_else(|| anyhow!("search for '{trainable}' produced no trials"))?;
    tracing::info!(
        "Best trial '{}': loss {:.4}, accuracy {:.4}",
        best.name,
        best.report.loss,
        best.report.accuracy
    );
    Ok(best)
}
