// ============================================================
// Layer 3 — Experiment Vocabulary
// ============================================================
// Closed enums over everything the harness can be asked to run.
//
// The original research code looked models and strategies up in
// string-keyed constructor maps, so a typo surfaced halfway
// through a run as a missing-key failure. Here every name is
// parsed into a closed variant at configuration time; an
// unsupported name never reaches construction.
//
// FromStr errors are plain Strings so this layer stays free of
// error-framework types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─── Models ───────────────────────────────────────────────────────────────────

/// The five supported architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    Mlp,
    Cnn,
    Rnn,
    Lstm,
    Transformer,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mlp => "MLP",
            ModelKind::Cnn => "CNN",
            ModelKind::Rnn => "RNN",
            ModelKind::Lstm => "LSTM",
            ModelKind::Transformer => "Transformer",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MLP" => Ok(ModelKind::Mlp),
            "CNN" => Ok(ModelKind::Cnn),
            "RNN" => Ok(ModelKind::Rnn),
            "LSTM" => Ok(ModelKind::Lstm),
            "TRANSFORMER" => Ok(ModelKind::Transformer),
            other => Err(format!(
                "unsupported model '{other}' (expected MLP, CNN, RNN, LSTM, or Transformer)"
            )),
        }
    }
}

// ─── Continual-learning strategies ────────────────────────────────────────────

/// The six supported continual-learning strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    Naive,
    Cumulative,
    Replay,
    Ewc,
    Si,
    Lwf,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Naive => "Naive",
            StrategyKind::Cumulative => "Cumulative",
            StrategyKind::Replay => "Replay",
            StrategyKind::Ewc => "EWC",
            StrategyKind::Si => "SI",
            StrategyKind::Lwf => "LwF",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(StrategyKind::Naive),
            "cumulative" => Ok(StrategyKind::Cumulative),
            "replay" => Ok(StrategyKind::Replay),
            "ewc" => Ok(StrategyKind::Ewc),
            "si" => Ok(StrategyKind::Si),
            "lwf" => Ok(StrategyKind::Lwf),
            other => Err(format!(
                "unsupported strategy '{other}' (expected Naive, Cumulative, Replay, EWC, SI, or LwF)"
            )),
        }
    }
}

// ─── Optimizers ───────────────────────────────────────────────────────────────

/// The two recognized optimizers. There is deliberately no default
/// branch anywhere: an unrecognized optimizer name is a
/// construction-time error.
///
/// Names are matched exactly ('SGD', 'Adam') since they come from
/// configuration values, not free-form user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "SGD",
            OptimizerKind::Adam => "Adam",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SGD" => Ok(OptimizerKind::Sgd),
            "Adam" => Ok(OptimizerKind::Adam),
            other => Err(format!("unrecognized optimizer '{other}' (expected SGD or Adam)")),
        }
    }
}

// ─── Nonlinearities ───────────────────────────────────────────────────────────

/// Activation functions accepted by the model factory.
///
/// The original code let unrecognized nonlinearity names fall
/// through silently and fail much later during layer construction.
/// That was a latent defect: here an unknown name is rejected at
/// parse time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nonlinearity {
    Relu,
    Tanh,
}

impl FromStr for Nonlinearity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(Nonlinearity::Relu),
            "tanh" => Ok(Nonlinearity::Tanh),
            other => Err(format!("unrecognized nonlinearity '{other}' (expected relu or tanh)")),
        }
    }
}

// ─── Datasets ─────────────────────────────────────────────────────────────────

/// Named datasets the loader can produce a scenario for.
/// Only the synthetic dataset ships with the harness; the clinical
/// corpora require external preprocessing and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    Random,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Random => "random",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(DatasetKind::Random),
            other => Err(format!("unsupported dataset '{other}' (expected random)")),
        }
    }
}

// ─── Demographic split keys ───────────────────────────────────────────────────

/// Demographic attribute used to carve the population into the
/// domain-incremental task sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemographicKey {
    Region,
    Sex,
    Age,
    Ethnicity,
    EthnicityCoarse,
    Hospital,
}

impl DemographicKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemographicKey::Region => "region",
            DemographicKey::Sex => "sex",
            DemographicKey::Age => "age",
            DemographicKey::Ethnicity => "ethnicity",
            DemographicKey::EthnicityCoarse => "ethnicity_coarse",
            DemographicKey::Hospital => "hospital",
        }
    }
}

impl fmt::Display for DemographicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemographicKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "region" => Ok(DemographicKey::Region),
            "sex" => Ok(DemographicKey::Sex),
            "age" => Ok(DemographicKey::Age),
            "ethnicity" => Ok(DemographicKey::Ethnicity),
            "ethnicity_coarse" => Ok(DemographicKey::EthnicityCoarse),
            "hospital" => Ok(DemographicKey::Hospital),
            other => Err(format!("unsupported demographic key '{other}'")),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_round_trip() {
        for kind in [
            ModelKind::Mlp,
            ModelKind::Cnn,
            ModelKind::Rnn,
            ModelKind::Lstm,
            ModelKind::Transformer,
        ] {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!("GRU".parse::<ModelKind>().is_err());
    }

    #[test]
    fn optimizer_names_are_exact() {
        assert_eq!("SGD".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert_eq!("Adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        // No case folding and no default branch.
        assert!("sgd".parse::<OptimizerKind>().is_err());
        assert!("RMSprop".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn unknown_nonlinearity_is_an_error_not_a_fallthrough() {
        assert!("relu".parse::<Nonlinearity>().is_ok());
        assert!("tanh".parse::<Nonlinearity>().is_ok());
        assert!("gelu".parse::<Nonlinearity>().is_err());
    }

    #[test]
    fn strategy_names_round_trip() {
        for kind in [
            StrategyKind::Naive,
            StrategyKind::Cumulative,
            StrategyKind::Replay,
            StrategyKind::Ewc,
            StrategyKind::Si,
            StrategyKind::Lwf,
        ] {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
    }
}
