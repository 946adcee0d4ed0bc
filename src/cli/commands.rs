// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `run` and `plot`, and all their
// configurable flags.
//
// Model, strategy, dataset, and demographic names arrive as
// strings and are converted to closed domain enums in
// `try_into_config`, so misspelled names are rejected before any
// model or strategy object exists.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::application::run_controller::RunConfig;
use crate::application::search::SearchSettings;
use crate::domain::experiment::{DatasetKind, DemographicKey, ModelKind, StrategyKind};
use crate::ml::trainer::TrainSettings;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the experiment grid (search with --validate, else full training)
    Run(RunArgs),

    /// Re-render comparison figures from a saved results JSON
    Plot(PlotArgs),
}

/// All arguments for the `run` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dataset to load (currently: random)
    #[arg(long, default_value = "random")]
    pub data: String,

    /// Demographic key for the domain-incremental split
    /// (region, sex, age, ethnicity, ethnicity_coarse, hospital)
    #[arg(long, default_value = "region")]
    pub demo: String,

    /// Prediction outcome label used in result/figure naming
    #[arg(long, default_value = "mortality")]
    pub outcome: String,

    /// Root directory for results, figures, and training logs
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Comma-separated model names (MLP, CNN, RNN, LSTM, Transformer)
    #[arg(long, default_value = "MLP", value_delimiter = ',')]
    pub models: Vec<String>,

    /// Comma-separated strategy names
    /// (Naive, Cumulative, Replay, SI, LwF, EWC)
    #[arg(long, default_value = "Naive,Cumulative,Replay,SI,LwF,EWC", value_delimiter = ',')]
    pub strategies: Vec<String>,

    /// Hyperparameter search over validation tasks instead of full training
    #[arg(long)]
    pub validate: bool,

    /// Number of independent search trials per (model, strategy) pair
    #[arg(long, default_value_t = 20)]
    pub num_samples: usize,

    /// Number of epochs per experience
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    /// Training mini-batch size
    #[arg(long, default_value_t = 128)]
    pub train_mb_size: usize,

    /// Evaluation mini-batch size
    #[arg(long, default_value_t = 1024)]
    pub eval_mb_size: usize,

    /// Seed for data generation, shuffling, and search sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl RunArgs {
    /// Convert CLI args into the application-layer RunConfig.
    /// This is the boundary between Layer 1 and Layer 2 —
    /// the application layer never sees clap types or raw strings.
    pub fn try_into_config(self) -> Result<RunConfig> {
        let data: DatasetKind = self.data.parse().map_err(|e: String| anyhow!(e))?;
        let demo: DemographicKey = self.demo.parse().map_err(|e: String| anyhow!(e))?;

        let models = self
            .models
            .iter()
            .map(|m| m.parse::<ModelKind>().map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;

        let strategies = self
            .strategies
            .iter()
            .map(|s| s.parse::<StrategyKind>().map_err(|e| anyhow!(e)))
            .collect::<Result<Vec<_>>>()?;

        Ok(RunConfig {
            data,
            demo,
            outcome: self.outcome,
            output_dir: self.output_dir,
            models,
            strategies,
            validate: self.validate,
            train: TrainSettings {
                train_epochs: self.epochs,
                train_mb_size: self.train_mb_size,
                eval_mb_size: self.eval_mb_size,
                eval_every: 1,
                seed: self.seed,
            },
            search: SearchSettings {
                num_samples: self.num_samples,
                cpus_per_trial: 4,
                seed: self.seed,
            },
        })
    }
}

/// All arguments for the `plot` command
#[derive(Args, Debug)]
pub struct PlotArgs {
    /// Dataset name the results were produced from
    #[arg(long, default_value = "random")]
    pub data: String,

    /// Outcome label the results were produced for
    #[arg(long, default_value = "mortality")]
    pub outcome: String,

    /// Demographic domain key the results were produced with
    #[arg(long, default_value = "region")]
    pub domain: String,

    /// Root directory the results were written under
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}
