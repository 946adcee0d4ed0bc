// ============================================================
// Layer 5 — Strategy Construction
// ============================================================
// Turns a (strategy kind, trial configuration) pair into an
// executable plan for the training loop:
//
//   - which optimizer to step with (SGD carries momentum 0.9,
//     Adam carries none — missing or malformed hyperparameters
//     are construction-time errors);
//   - how to compose each experience's training set (current task
//     only, all tasks seen so far, or current plus a bounded
//     replay buffer);
//   - whether a previous-model penalty is added to the loss
//     (EWC/SI anchor the new outputs to the old, LwF distills
//     through a temperature).
//
// Building a strategy also opens its per-run metric sink, so the
// sink directory exists before the first batch is trained.

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::data::dataset::EpisodeSample;
use crate::data::scenario::Experience;
use crate::domain::experiment::{ModelKind, OptimizerKind, StrategyKind};
use crate::domain::search_space::TrialConfig;
use crate::infra::metric_sink::MetricSink;
use crate::infra::paths::RunPaths;

const SGD_MOMENTUM: f64 = 0.9;

// The LwF temperature is tuned over a range that includes zero;
// scaling logits by 1/T needs a floor.
const MIN_TEMPERATURE: f64 = 1e-3;

// ─── Optimizer selection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSelection {
    pub kind: OptimizerKind,
    pub lr: f64,
    pub momentum: Option<f64>,
}

impl OptimizerSelection {
    pub fn from_config(config: &TrialConfig) -> Result<Self> {
        let kind: OptimizerKind = config
            .text("optimizer")?
            .parse()
            .map_err(|e: String| anyhow!(e))?;
        let lr = config.f64("lr")?;
        let momentum = match kind {
            OptimizerKind::Sgd => Some(SGD_MOMENTUM),
            OptimizerKind::Adam => None,
        };
        Ok(Self { kind, lr, momentum })
    }
}

// ─── Strategy plans ───────────────────────────────────────────────────────────

/// How the training set of each experience is composed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Current experience only.
    Current,
    /// Every experience seen so far, current included.
    Cumulative,
    /// Current experience plus up to mem_size retained samples per
    /// past experience.
    Replay { mem_size: usize },
}

/// A previous-model penalty added to the task loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltySpec {
    pub weight: f64,
    /// Some(T): distill the previous model's softened outputs (LwF).
    /// None: anchor new outputs to the previous ones (EWC/SI).
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPlan {
    pub kind: StrategyKind,
    pub schedule: Schedule,
    pub penalty: Option<PenaltySpec>,
}

impl StrategyPlan {
    pub fn from_config(kind: StrategyKind, config: &TrialConfig) -> Result<Self> {
        let (schedule, penalty) = match kind {
            StrategyKind::Naive => (Schedule::Current, None),
            StrategyKind::Cumulative => (Schedule::Cumulative, None),
            StrategyKind::Replay => {
                let mem_size = config.usize("mem_size").context("Replay strategy")?;
                (Schedule::Replay { mem_size }, None)
            }
            StrategyKind::Ewc => {
                let weight = config.f64("ewc_lambda").context("EWC strategy")?;
                (Schedule::Current, Some(PenaltySpec { weight, temperature: None }))
            }
            StrategyKind::Si => {
                let weight = config.f64("si_lambda").context("SI strategy")?;
                (Schedule::Current, Some(PenaltySpec { weight, temperature: None }))
            }
            StrategyKind::Lwf => {
                let weight = config.f64("alpha").context("LwF strategy")?;
                let temperature = config.f64("temperature").context("LwF strategy")?;
                (
                    Schedule::Current,
                    Some(PenaltySpec {
                        weight,
                        temperature: Some(temperature.max(MIN_TEMPERATURE)),
                    }),
                )
            }
        };
        Ok(Self { kind, schedule, penalty })
    }
}

// ─── Replay buffer ────────────────────────────────────────────────────────────

/// Bounded memory of past experiences: at most mem_size samples are
/// retained per completed experience.
#[derive(Debug, Default)]
pub struct ReplayBuffer {
    mem_size: usize,
    store: Vec<EpisodeSample>,
}

impl ReplayBuffer {
    pub fn new(mem_size: usize) -> Self {
        Self { mem_size, store: Vec::new() }
    }

    /// Retain a random mem_size-subset of a completed experience.
    pub fn absorb(&mut self, experience: &Experience, rng: &mut StdRng) {
        let take = self.mem_size.min(experience.train.len());
        self.store.extend(
            experience
                .train
                .choose_multiple(rng, take)
                .cloned(),
        );
    }

    pub fn samples(&self) -> &[EpisodeSample] {
        &self.store
    }
}

/// The training set the current experience is actually trained on.
pub fn compose_train_set(
    schedule: &Schedule,
    seen: &[&Experience],
    current: &Experience,
    buffer: &ReplayBuffer,
) -> Vec<EpisodeSample> {
    match schedule {
        Schedule::Current => current.train.clone(),
        Schedule::Cumulative => {
            let mut set: Vec<EpisodeSample> = seen
                .iter()
                .flat_map(|exp| exp.train.iter().cloned())
                .collect();
            set.extend(current.train.iter().cloned());
            set
        }
        Schedule::Replay { .. } => {
            let mut set = buffer.samples().to_vec();
            set.extend(current.train.iter().cloned());
            set
        }
    }
}

// ─── Strategy handle ──────────────────────────────────────────────────────────

/// Everything the training loop needs from the strategy layer.
pub struct StrategyHandle {
    pub plan: StrategyPlan,
    pub optimizer: OptimizerSelection,
    pub sink: MetricSink,
    /// Per-experience progress logging; suppressed during search.
    pub verbose: bool,
}

/// Build the executable strategy for one run. Opens the metric
/// sink directory keyed by run timestamp, model, and strategy.
pub fn load_strategy(
    model: ModelKind,
    strategy: StrategyKind,
    config: &TrialConfig,
    paths: &RunPaths,
    timestamp: &str,
    validate: bool,
) -> Result<StrategyHandle> {
    let optimizer = OptimizerSelection::from_config(config)?;
    let plan = StrategyPlan::from_config(strategy, config)?;
    let sink = MetricSink::create(&paths.tb_dir(timestamp, model.as_str(), strategy.as_str()))?;
    Ok(StrategyHandle {
        plan,
        optimizer,
        sink,
        verbose: !validate,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search_space::ParamValue;
    use rand::SeedableRng;

    fn config(pairs: &[(&str, ParamValue)]) -> TrialConfig {
        TrialConfig::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    fn sgd_base() -> Vec<(&'static str, ParamValue)> {
        vec![
            ("lr", ParamValue::Float(0.01)),
            ("optimizer", ParamValue::Text("SGD".into())),
        ]
    }

    fn experience(task_id: usize, n: usize) -> Experience {
        Experience {
            task_id,
            train: (0..n)
                .map(|i| EpisodeSample::new(vec![i as f32], i % 2))
                .collect(),
            test: Vec::new(),
        }
    }

    #[test]
    fn sgd_selection_carries_momentum() {
        let selection = OptimizerSelection::from_config(&config(&sgd_base())).unwrap();
        assert_eq!(selection.kind, OptimizerKind::Sgd);
        assert_eq!(selection.momentum, Some(0.9));
        assert!((selection.lr - 0.01).abs() < 1e-12);
    }

    #[test]
    fn adam_selection_has_no_momentum() {
        let selection = OptimizerSelection::from_config(&config(&[
            ("lr", ParamValue::Float(0.001)),
            ("optimizer", ParamValue::Text("Adam".into())),
        ]))
        .unwrap();
        assert_eq!(selection.kind, OptimizerKind::Adam);
        assert_eq!(selection.momentum, None);
    }

    #[test]
    fn unknown_optimizer_fails_at_construction() {
        let result = OptimizerSelection::from_config(&config(&[
            ("lr", ParamValue::Float(0.001)),
            ("optimizer", ParamValue::Text("RMSprop".into())),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn replay_plan_requires_mem_size() {
        assert!(StrategyPlan::from_config(StrategyKind::Replay, &config(&sgd_base())).is_err());

        let mut pairs = sgd_base();
        pairs.push(("mem_size", ParamValue::Int(5)));
        let plan = StrategyPlan::from_config(StrategyKind::Replay, &config(&pairs)).unwrap();
        assert_eq!(plan.schedule, Schedule::Replay { mem_size: 5 });
        assert!(plan.penalty.is_none());
    }

    #[test]
    fn lwf_temperature_is_floored_above_zero() {
        let mut pairs = sgd_base();
        pairs.push(("alpha", ParamValue::Float(1.0)));
        pairs.push(("temperature", ParamValue::Float(0.0)));
        let plan = StrategyPlan::from_config(StrategyKind::Lwf, &config(&pairs)).unwrap();
        let penalty = plan.penalty.unwrap();
        assert!(penalty.temperature.unwrap() > 0.0);
    }

    #[test]
    fn penalty_strategies_parse_their_weight() {
        let mut ewc = sgd_base();
        ewc.push(("ewc_lambda", ParamValue::Float(0.5)));
        let plan = StrategyPlan::from_config(StrategyKind::Ewc, &config(&ewc)).unwrap();
        assert_eq!(plan.penalty, Some(PenaltySpec { weight: 0.5, temperature: None }));
        assert_eq!(plan.schedule, Schedule::Current);

        let mut si = sgd_base();
        si.push(("si_lambda", ParamValue::Float(2.0)));
        let plan = StrategyPlan::from_config(StrategyKind::Si, &config(&si)).unwrap();
        assert_eq!(plan.penalty.unwrap().weight, 2.0);
    }

    #[test]
    fn replay_buffer_caps_per_experience() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut buffer = ReplayBuffer::new(5);
        buffer.absorb(&experience(0, 20), &mut rng);
        assert_eq!(buffer.samples().len(), 5);
        buffer.absorb(&experience(1, 3), &mut rng);
        assert_eq!(buffer.samples().len(), 8);
    }

    #[test]
    fn schedules_compose_the_expected_train_sets() {
        let first = experience(0, 10);
        let second = experience(1, 7);
        let seen = vec![&first];

        let mut rng = StdRng::seed_from_u64(1);
        let mut buffer = ReplayBuffer::new(2);
        buffer.absorb(&first, &mut rng);

        let naive = compose_train_set(&Schedule::Current, &seen, &second, &buffer);
        assert_eq!(naive.len(), 7);

        let cumulative = compose_train_set(&Schedule::Cumulative, &seen, &second, &buffer);
        assert_eq!(cumulative.len(), 17);

        let replay =
            compose_train_set(&Schedule::Replay { mem_size: 2 }, &seen, &second, &buffer);
        assert_eq!(replay.len(), 9);
    }
}
