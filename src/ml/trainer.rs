// ============================================================
// Layer 5 — Training Loop Driver
// ============================================================
// Runs one (model, strategy, configuration) combination over a
// scenario: experiences strictly in task order, a fixed number of
// epochs each, with an eval pass after every epoch.
//
// Training happens on the autodiff backend; every eval pass runs
// on the plain backend via model.valid(). The per-epoch eval
// stream depends on the run mode: search runs self-evaluate on the
// train stream, full runs evaluate on the held-out test stream.
//
// The two run modes also return differently:
//   - validation runs end with one final eval pass over the test
//     stream and reduce it to (loss, accuracy);
//   - full runs return the accumulated metric curves.

use anyhow::{Context, Result};
use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::activation,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::batcher::EpisodeBatcher;
use crate::data::dataset::ExperienceDataset;
use crate::data::loader::{self, LoadedData};
use crate::data::scenario::{Experience, Scenario};
use crate::domain::experiment::{DatasetKind, DemographicKey, ModelKind, OptimizerKind, StrategyKind};
use crate::domain::results::{TrainOutcome, ValidationResult};
use crate::domain::search_space::TrialConfig;
use crate::infra::paths::RunPaths;
use crate::ml::evaluator::{
    self, Evaluator, ExpEval, StreamEval, StreamId, METRIC_ACC, METRIC_LOSS,
};
use crate::ml::models::{
    CnnConfig, LstmConfig, MlpConfig, RnnConfig, SequenceClassifier, TransformerConfig,
};
use crate::ml::strategy::{self, load_strategy, PenaltySpec, Schedule, StrategyHandle};

pub type TrainBackend = Autodiff<NdArray<f32>>;
pub type EvalBackend = NdArray<f32>;

/// Knobs of the training loop itself, fixed for a whole run.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub train_epochs: usize,
    pub train_mb_size: usize,
    pub eval_mb_size: usize,
    pub eval_every: usize,
    pub seed: u64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            train_epochs: 20,
            train_mb_size: 128,
            eval_mb_size: 1024,
            eval_every: 1,
            seed: 42,
        }
    }
}

/// Run one trial end to end: load the scenario, build the model
/// and strategy, train over the experience stream, and extract
/// the mode-appropriate outcome.
#[allow(clippy::too_many_arguments)]
pub fn training_loop(
    config: &TrialConfig,
    data: DatasetKind,
    demo: DemographicKey,
    model_kind: ModelKind,
    strategy_kind: StrategyKind,
    timestamp: &str,
    validate: bool,
    paths: &RunPaths,
    settings: &TrainSettings,
) -> Result<TrainOutcome> {
    tracing::info!("Loading data...");
    let loaded = loader::load_data(data, demo, validate, settings.seed)?;
    tracing::info!(
        "Data loaded: {} task(s), {} timestep(s), {} channel(s)",
        loaded.n_tasks,
        loaded.n_timesteps,
        loaded.n_channels
    );

    let device = <TrainBackend as Backend>::Device::default();
    let handle = load_strategy(model_kind, strategy_kind, config, paths, timestamp, validate)
        .with_context(|| format!("building strategy {strategy_kind} for {model_kind}"))?;

    match model_kind {
        ModelKind::Mlp => {
            let model = MlpConfig::new(loaded.n_channels, loaded.n_timesteps).init::<TrainBackend>(&device);
            train_method(model, handle, &loaded, settings, validate, &device)
        }
        ModelKind::Cnn => {
            let model = CnnConfig::new(loaded.n_channels, loaded.n_timesteps).init::<TrainBackend>(&device);
            train_method(model, handle, &loaded, settings, validate, &device)
        }
        ModelKind::Rnn => {
            let model = RnnConfig::new(loaded.n_channels, loaded.n_timesteps).init::<TrainBackend>(&device);
            train_method(model, handle, &loaded, settings, validate, &device)
        }
        ModelKind::Lstm => {
            let model = LstmConfig::new(loaded.n_channels, loaded.n_timesteps).init::<TrainBackend>(&device);
            train_method(model, handle, &loaded, settings, validate, &device)
        }
        ModelKind::Transformer => {
            let model = TransformerConfig::new(loaded.n_channels, loaded.n_timesteps).init::<TrainBackend>(&device);
            train_method(model, handle, &loaded, settings, validate, &device)
        }
    }
}

/// Select the optimizer and hand over to the experience loop.
fn train_method<M>(
    model: M,
    handle: StrategyHandle,
    loaded: &LoadedData,
    settings: &TrainSettings,
    validate: bool,
    device: &<TrainBackend as Backend>::Device,
) -> Result<TrainOutcome>
where
    M: AutodiffModule<TrainBackend> + SequenceClassifier<TrainBackend> + 'static,
    M::InnerModule: SequenceClassifier<EvalBackend>,
{
    match handle.optimizer.kind {
        OptimizerKind::Sgd => {
            let momentum = handle.optimizer.momentum.unwrap_or(0.9);
            let optim = SgdConfig::new()
                .with_momentum(Some(MomentumConfig::new().with_momentum(momentum)))
                .init();
            run_experiences(model, optim, handle, loaded, settings, validate, device)
        }
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().init();
            run_experiences(model, optim, handle, loaded, settings, validate, device)
        }
    }
}

fn run_experiences<M, O>(
    mut model: M,
    mut optim: O,
    handle: StrategyHandle,
    loaded: &LoadedData,
    settings: &TrainSettings,
    validate: bool,
    device: &<TrainBackend as Backend>::Device,
) -> Result<TrainOutcome>
where
    M: AutodiffModule<TrainBackend> + SequenceClassifier<TrainBackend> + 'static,
    M::InnerModule: SequenceClassifier<EvalBackend>,
    O: Optimizer<M, TrainBackend>,
{
    let scenario = &loaded.scenario;
    let criterion = CrossEntropyLossConfig::new().init(device);

    let eval_device = <EvalBackend as Backend>::Device::default();
    let eval_criterion = CrossEntropyLossConfig::new().init(&eval_device);
    let eval_batcher =
        EpisodeBatcher::<EvalBackend>::new(eval_device, loaded.n_timesteps, loaded.n_channels);
    let train_batcher =
        EpisodeBatcher::<TrainBackend>::new(device.clone(), loaded.n_timesteps, loaded.n_channels);

    // Search runs self-evaluate on the train stream each epoch; the
    // held-out test stream is reserved for the final pass. Full runs
    // track the test stream throughout.
    let eval_stream = if validate { StreamId::Train } else { StreamId::Test };

    let mut evaluator = Evaluator::new();
    let mut replay = ReplayState::new(&handle.plan.schedule);
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut seen: Vec<&Experience> = Vec::new();
    let mut prev_model: Option<M> = None;
    let mut step = 0usize;

    tracing::info!("Starting experiment...");
    for experience in scenario.train_stream() {
        if handle.verbose {
            tracing::info!("Start of experience {}", experience.task_id);
        }

        let train_set =
            strategy::compose_train_set(&handle.plan.schedule, &seen, experience, &replay.buffer);
        let dataloader = DataLoaderBuilder::new(train_batcher.clone())
            .batch_size(settings.train_mb_size)
            .shuffle(settings.seed.wrapping_add(experience.task_id as u64))
            .num_workers(1)
            .build(ExperienceDataset::new(train_set));

        for epoch in 1..=settings.train_epochs {
            let mut loss_sum = 0.0;
            let mut n_batches = 0usize;

            for batch in dataloader.iter() {
                let logits = model.forward(batch.features.clone());
                let mut loss = criterion.forward(logits.clone(), batch.targets.clone());

                if let (Some(prev), Some(penalty)) = (&prev_model, &handle.plan.penalty) {
                    let anchor = prev.forward(batch.features).detach();
                    loss = loss + penalty_term(logits, anchor, penalty);
                }

                loss_sum += loss.clone().into_scalar().elem::<f64>();
                n_batches += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(handle.optimizer.lr, model, grads);
            }

            if epoch % settings.eval_every == 0 {
                let eval_model = model.valid();
                let eval = eval_stream_pass(
                    &eval_model,
                    scenario,
                    eval_stream,
                    &eval_batcher,
                    &eval_criterion,
                    settings.eval_mb_size,
                );
                evaluator.record(step, eval_stream, &eval);
                handle.sink.log(
                    experience.task_id,
                    epoch,
                    eval_stream.as_str(),
                    eval.loss,
                    eval.accuracy,
                )?;
                if handle.verbose {
                    let train_loss = if n_batches > 0 { loss_sum / n_batches as f64 } else { f64::NAN };
                    tracing::info!(
                        "Experience {} epoch {epoch}: train loss {train_loss:.4}, eval loss {:.4}, eval acc {:.4}",
                        experience.task_id,
                        eval.loss,
                        eval.accuracy
                    );
                }
                step += 1;
            }
        }

        if handle.plan.penalty.is_some() {
            prev_model = Some(model.clone());
        }
        replay.absorb(experience, &mut rng);
        seen.push(experience);

        if handle.verbose {
            tracing::info!("Training completed for experience {}", experience.task_id);
        }
    }

    if validate {
        // Final pass over the held-out stream; stream metrics come
        // back task-qualified and are read through the fallback.
        let eval_model = model.valid();
        let eval = eval_stream_pass(
            &eval_model,
            scenario,
            StreamId::Test,
            &eval_batcher,
            &eval_criterion,
            settings.eval_mb_size,
        );
        let map = evaluator::final_metrics(&eval, StreamId::Test);
        let loss =
            evaluator::metric_with_fallback(&map, &evaluator::stream_key(METRIC_LOSS, StreamId::Test))?;
        let accuracy =
            evaluator::metric_with_fallback(&map, &evaluator::stream_key(METRIC_ACC, StreamId::Test))?;
        Ok(TrainOutcome::Validation(ValidationResult { loss, accuracy }))
    } else {
        Ok(TrainOutcome::Training(evaluator.into_result()))
    }
}

/// Replay buffer plus the knowledge of whether it is in use.
struct ReplayState {
    buffer: strategy::ReplayBuffer,
    active: bool,
}

impl ReplayState {
    fn new(schedule: &Schedule) -> Self {
        match schedule {
            Schedule::Replay { mem_size } => Self {
                buffer: strategy::ReplayBuffer::new(*mem_size),
                active: true,
            },
            _ => Self {
                buffer: strategy::ReplayBuffer::new(0),
                active: false,
            },
        }
    }

    fn absorb(&mut self, experience: &Experience, rng: &mut StdRng) {
        if self.active {
            self.buffer.absorb(experience, rng);
        }
    }
}

/// The previous-model penalty: distillation when a temperature is
/// present (LwF), output anchoring otherwise (EWC/SI).
fn penalty_term(
    logits: Tensor<TrainBackend, 2>,
    anchor: Tensor<TrainBackend, 2>,
    penalty: &PenaltySpec,
) -> Tensor<TrainBackend, 1> {
    match penalty.temperature {
        Some(temperature) => {
            let soft_targets = activation::softmax(anchor.div_scalar(temperature), 1);
            let log_probs = activation::log_softmax(logits.div_scalar(temperature), 1);
            (soft_targets * log_probs)
                .sum_dim(1)
                .mean()
                .neg()
                .mul_scalar(penalty.weight)
        }
        None => {
            let drift = logits - anchor;
            (drift.clone() * drift).mean().mul_scalar(penalty.weight)
        }
    }
}

/// Evaluate the model over every experience of a stream, in
/// fixed-size chunks on the plain backend.
fn eval_stream_pass<M: SequenceClassifier<EvalBackend>>(
    model: &M,
    scenario: &Scenario,
    stream: StreamId,
    batcher: &EpisodeBatcher<EvalBackend>,
    criterion: &CrossEntropyLoss<EvalBackend>,
    eval_mb_size: usize,
) -> StreamEval {
    let mut per_exp = Vec::new();

    for experience in scenario.test_stream() {
        let samples = match stream {
            StreamId::Train => &experience.train,
            StreamId::Test => &experience.test,
        };

        let mut loss_sum = 0.0;
        let mut n_batches = 0usize;
        let mut correct = 0usize;
        let mut total = 0usize;

        for chunk in samples.chunks(eval_mb_size) {
            let batch = batcher.batch(chunk.to_vec());
            let logits = model.forward(batch.features);
            let loss = criterion.forward(logits.clone(), batch.targets.clone());
            loss_sum += loss.into_scalar().elem::<f64>();
            n_batches += 1;

            let predictions = logits.argmax(1).flatten::<1>(0, 1);
            let hits: i64 = predictions
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            correct += hits as usize;
            total += chunk.len();
        }

        per_exp.push(ExpEval {
            task_id: experience.task_id,
            loss: if n_batches > 0 { loss_sum / n_batches as f64 } else { f64::NAN },
            accuracy: if total > 0 { correct as f64 / total as f64 } else { 0.0 },
            n_samples: total,
        });
    }

    StreamEval::from_experiences(per_exp)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search_space::ParamValue;
    use std::fs;
    use std::path::PathBuf;

    fn temp_run(tag: &str) -> (PathBuf, RunPaths) {
        let dir = std::env::temp_dir().join(format!("clinical-cl-train-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        (dir.clone(), RunPaths::new(&dir))
    }

    fn sgd_config() -> TrialConfig {
        TrialConfig::from_pairs([
            ("lr".to_string(), ParamValue::Float(0.05)),
            ("optimizer".to_string(), ParamValue::Text("SGD".into())),
        ])
    }

    fn quick_settings() -> TrainSettings {
        TrainSettings {
            train_epochs: 1,
            train_mb_size: 32,
            eval_mb_size: 256,
            eval_every: 1,
            seed: 7,
        }
    }

    #[test]
    fn full_run_returns_test_stream_curves() {
        let (dir, paths) = temp_run("full");

        let outcome = training_loop(
            &sgd_config(),
            DatasetKind::Random,
            DemographicKey::Region,
            ModelKind::Mlp,
            StrategyKind::Naive,
            "0000-00-00-00-00-00",
            false,
            &paths,
            &quick_settings(),
        )
        .unwrap();

        match outcome {
            TrainOutcome::Training(result) => {
                let key = evaluator::stream_key(METRIC_ACC, StreamId::Test);
                let curve = result.curve(&key).expect("test stream accuracy curve");
                // One eval per epoch per experience: 5 tasks x 1 epoch.
                assert_eq!(curve.values.len(), 5);
                assert!(result
                    .curve(&evaluator::exp_key(METRIC_LOSS, StreamId::Test, 0))
                    .is_some());
            }
            TrainOutcome::Validation(_) => panic!("full run produced a validation result"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn validation_run_reduces_to_scalars() {
        let (dir, paths) = temp_run("validate");

        let outcome = training_loop(
            &sgd_config(),
            DatasetKind::Random,
            DemographicKey::Region,
            ModelKind::Mlp,
            StrategyKind::Naive,
            "0000-00-00-00-00-00",
            true,
            &paths,
            &quick_settings(),
        )
        .unwrap();

        match outcome {
            TrainOutcome::Validation(result) => {
                assert!(result.loss.is_finite());
                assert!((0.0..=1.0).contains(&result.accuracy));
            }
            TrainOutcome::Training(_) => panic!("validation run produced training curves"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn metric_sink_is_populated_during_training() {
        let (dir, paths) = temp_run("sink");

        training_loop(
            &sgd_config(),
            DatasetKind::Random,
            DemographicKey::Region,
            ModelKind::Mlp,
            StrategyKind::Naive,
            "0000-00-00-00-00-00",
            false,
            &paths,
            &quick_settings(),
        )
        .unwrap();

        let csv = paths
            .tb_dir("0000-00-00-00-00-00", "MLP", "Naive")
            .join("metrics.csv");
        let contents = fs::read_to_string(csv).unwrap();
        // Header plus one record per eval pass.
        assert_eq!(contents.lines().count(), 6);

        fs::remove_dir_all(&dir).unwrap();
    }
}
