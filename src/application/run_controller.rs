// ============================================================
// Layer 2 — Run Controller
// ============================================================
// Walks the model x strategy grid for one experiment context and
// fills the results table. Models iterate in the outer loop,
// strategies in the inner loop, sequentially — a failed pair aborts
// the run rather than leaving a silently incomplete table.
//
// Two run modes:
//   --validate: each pair runs a hyperparameter search over the
//     merged space and records the best configuration found;
//   full: each pair trains with its previously tuned configuration
//     (or a point-only space, if no tuned config exists) and
//     records its metric curves; figures are rendered at the end.
//
// One timestamp is taken at the start and threaded through every
// artifact path, so all sinks and figures of a run share a key.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::application::search::{self, LocalTuner, SearchSettings};
use crate::domain::experiment::{DatasetKind, DemographicKey, ModelKind, StrategyKind};
use crate::domain::results::{PairOutcome, ResultsTable, TrainOutcome};
use crate::domain::search_space::{ParamDomain, ParamValue, SearchSpace};
use crate::infra::paths::{run_timestamp, RunPaths};
use crate::infra::results_store;
use crate::ml::trainer::{self, TrainSettings};

/// Everything one invocation of the harness was asked to do.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data: DatasetKind,
    pub demo: DemographicKey,
    pub outcome: String,
    pub output_dir: PathBuf,
    pub models: Vec<ModelKind>,
    pub strategies: Vec<StrategyKind>,
    pub validate: bool,
    pub train: TrainSettings,
    pub search: SearchSettings,
}

/// The generic space every strategy searches over: learning rate
/// and optimizer choice.
pub fn default_generic_space() -> SearchSpace {
    SearchSpace::new()
        .insert("lr", ParamDomain::LogUniform { low: 1e-4, high: 1e-1 })
        .insert(
            "optimizer",
            ParamDomain::Choice(vec![
                ParamValue::Text("SGD".into()),
                ParamValue::Text("Adam".into()),
            ]),
        )
}

/// Strategy-specific spaces. Strategies without an entry (Naive,
/// Cumulative) search the generic space alone.
pub fn default_cl_spaces() -> BTreeMap<StrategyKind, SearchSpace> {
    let mut spaces = BTreeMap::new();
    spaces.insert(
        StrategyKind::Replay,
        SearchSpace::new().insert(
            "mem_size",
            ParamDomain::Choice(vec![
                ParamValue::Int(2),
                ParamValue::Int(5),
                ParamValue::Int(10),
            ]),
        ),
    );
    spaces.insert(
        StrategyKind::Ewc,
        SearchSpace::new().insert("ewc_lambda", ParamDomain::LogUniform { low: 1e-3, high: 1e2 }),
    );
    spaces.insert(
        StrategyKind::Si,
        SearchSpace::new().insert("si_lambda", ParamDomain::LogUniform { low: 1e-3, high: 1e2 }),
    );
    spaces.insert(
        StrategyKind::Lwf,
        SearchSpace::new()
            .insert("alpha", ParamDomain::LogUniform { low: 1e-3, high: 1e2 })
            .insert("temperature", ParamDomain::Uniform { low: 0.0, high: 2.0 }),
    );
    spaces
}

pub struct RunController {
    config: RunConfig,
    paths: RunPaths,
}

impl RunController {
    pub fn new(config: RunConfig) -> Self {
        let paths = RunPaths::new(&config.output_dir);
        Self { config, paths }
    }

    /// Run the whole grid and persist the results table. Returns
    /// the populated table.
    pub fn execute(
        &self,
        generic: &SearchSpace,
        per_strategy: &BTreeMap<StrategyKind, SearchSpace>,
    ) -> Result<ResultsTable> {
        let cfg = &self.config;
        let timestamp = run_timestamp();
        let mut table = ResultsTable::new(
            cfg.data.as_str(),
            &cfg.outcome,
            cfg.demo.as_str(),
            &timestamp,
        );

        tracing::info!(
            "Run started: {} model(s) x {} strateg(ies), mode {}",
            cfg.models.len(),
            cfg.strategies.len(),
            if cfg.validate { "search" } else { "full training" }
        );

        for &model in &cfg.models {
            for &strategy in &cfg.strategies {
                tracing::info!("Pair ({model}, {strategy})");
                let space = generic.merged(per_strategy.get(&strategy));

                let outcome = if cfg.validate {
                    self.search_pair(model, strategy, &space, &timestamp)?
                } else {
                    self.train_pair(model, strategy, &space, &timestamp)?
                };
                table.record(model.as_str(), strategy.as_str(), outcome);
            }
        }

        let results_file = results_store::save_results(&self.paths, &table)?;
        tracing::info!("Results written to '{}'", results_file.display());

        if !cfg.validate {
            let fig_dir = crate::plot::render_all(&table, &self.paths, &timestamp)?;
            tracing::info!("Figures written under '{}'", fig_dir.display());
        }

        Ok(table)
    }

    fn search_pair(
        &self,
        model: ModelKind,
        strategy: StrategyKind,
        space: &SearchSpace,
        timestamp: &str,
    ) -> Result<PairOutcome> {
        let cfg = &self.config;
        let trainable = format!("{model}_{strategy}");
        let artifact_dir = self
            .paths
            .search_dir(cfg.data.as_str(), cfg.demo.as_str(), &trainable);

        let mut tuner = LocalTuner {
            data: cfg.data,
            demo: cfg.demo,
            model,
            strategy,
            timestamp,
            paths: &self.paths,
            train: &cfg.train,
        };

        let best = search::hyperparam_opt(space, &mut tuner, &trainable, &cfg.search, &artifact_dir)?;
        results_store::save_best_config(
            &self.paths,
            cfg.data.as_str(),
            &cfg.outcome,
            cfg.demo.as_str(),
            model.as_str(),
            strategy.as_str(),
            &best.config,
        )?;
        Ok(PairOutcome::BestConfig(best.config))
    }

    fn train_pair(
        &self,
        model: ModelKind,
        strategy: StrategyKind,
        space: &SearchSpace,
        timestamp: &str,
    ) -> Result<PairOutcome> {
        let cfg = &self.config;
        let tuned = results_store::try_load_best_config(
            &self.paths,
            cfg.data.as_str(),
            &cfg.outcome,
            cfg.demo.as_str(),
            model.as_str(),
            strategy.as_str(),
        )?;
        let config = match tuned {
            Some(config) => config,
            None => space
                .require_points()
                .with_context(|| format!("no tuned configuration found for ({model}, {strategy})"))?,
        };

        let outcome = trainer::training_loop(
            &config,
            cfg.data,
            cfg.demo,
            model,
            strategy,
            timestamp,
            false,
            &self.paths,
            &cfg.train,
        )?;
        match outcome {
            TrainOutcome::Training(result) => Ok(PairOutcome::Metrics(result)),
            TrainOutcome::Validation(_) => {
                bail!("full-training run for ({model}, {strategy}) produced a validation result")
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_spaces_cover_every_tuned_strategy() {
        let spaces = default_cl_spaces();
        assert!(spaces.contains_key(&StrategyKind::Replay));
        assert!(spaces.contains_key(&StrategyKind::Ewc));
        assert!(spaces.contains_key(&StrategyKind::Si));
        assert!(spaces.contains_key(&StrategyKind::Lwf));
        // Naive and Cumulative search the generic space alone.
        assert!(!spaces.contains_key(&StrategyKind::Naive));
        assert!(!spaces.contains_key(&StrategyKind::Cumulative));
    }

    #[test]
    fn merged_replay_space_samples_valid_strategy_params() {
        let spaces = default_cl_spaces();
        let merged = default_generic_space().merged(spaces.get(&StrategyKind::Replay));
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..20 {
            let config = merged.sample(&mut rng).unwrap();
            let mem_size = config.usize("mem_size").unwrap();
            assert!([2, 5, 10].contains(&mem_size));
            assert!(config.f64("lr").unwrap() > 0.0);
            assert!(["SGD", "Adam"].contains(&config.text("optimizer").unwrap()));
        }
    }

    #[test]
    fn lwf_space_includes_temperature_range() {
        let spaces = default_cl_spaces();
        let merged = default_generic_space().merged(spaces.get(&StrategyKind::Lwf));
        let mut rng = StdRng::seed_from_u64(5);
        let config = merged.sample(&mut rng).unwrap();
        let temperature = config.f64("temperature").unwrap();
        assert!((0.0..2.0).contains(&temperature));
        assert!(config.f64("alpha").unwrap() > 0.0);
    }
}
