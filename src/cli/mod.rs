// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All orchestration logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `run`  — drives the model x strategy experiment grid
//               (hyperparameter search or full training)
//   2. `plot` — re-renders comparison figures from a saved
//               results JSON file

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PlotArgs, RunArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "clinical-cl",
    version = "0.1.0",
    about = "Continual-learning experiment harness for clinical time-series data."
)]
pub struct Cli {
    /// The subcommand to run (run or plot)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => Self::run_experiments(args),
            Commands::Plot(args) => Self::run_plot(args),
        }
    }

    /// Handles the `run` subcommand.
    /// Converts CLI args into a RunConfig and hands off to Layer 2.
    /// All name-to-enum parsing happens here, so an unsupported model,
    /// strategy, or dataset name fails before anything is constructed.
    fn run_experiments(args: RunArgs) -> Result<()> {
        use crate::application::run_controller::{
            default_cl_spaces, default_generic_space, RunController,
        };

        let validate = args.validate;
        let config = args.try_into_config()?;

        tracing::info!(
            "Starting {} over {} model(s) x {} strateg(ies) on '{}'",
            if validate { "hyperparameter search" } else { "full training" },
            config.models.len(),
            config.strategies.len(),
            config.data,
        );

        let controller = RunController::new(config);
        let results = controller.execute(&default_generic_space(), &default_cl_spaces())?;

        println!(
            "Run complete: {} (model, strategy) pair(s) recorded.",
            results.pair_count()
        );
        Ok(())
    }

    /// Handles the `plot` subcommand.
    /// Reads a results JSON produced by a previous `run` and renders
    /// the comparison figures without retraining anything.
    fn run_plot(args: PlotArgs) -> Result<()> {
        use crate::infra::paths::{run_timestamp, RunPaths};
        use crate::infra::results_store;

        let paths = RunPaths::new(&args.output_dir);
        let table = results_store::load_results(&paths, &args.data, &args.outcome, &args.domain)?;

        let fig_dir = crate::plot::render_all(&table, &paths, &run_timestamp())?;
        println!("Figures written under '{}'", fig_dir.display());
        Ok(())
    }
}
