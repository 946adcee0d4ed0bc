// ============================================================
// Layer 3 — Hyperparameter Spaces
// ============================================================
// A SearchSpace maps hyperparameter names to domains: fixed
// points, uniform/log-uniform ranges, or categorical choices.
// Sampling a space yields a TrialConfig — an immutable point
// that is handed to exactly one trial.
//
// Merging: the run controller unions the generic space with a
// strategy-specific space, with specific keys overriding generic
// ones. Merging is idempotent — merging the same inputs twice
// yields the identical mapping.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ─── Parameter values ─────────────────────────────────────────────────────────

/// A single sampled hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

// ─── Parameter domains ────────────────────────────────────────────────────────

/// What a hyperparameter is allowed to be: a fixed point, a range
/// to sample from, or a finite set of choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDomain {
    /// A fixed value — sampling always returns it.
    Point(ParamValue),
    /// Uniform over [low, high).
    Uniform { low: f64, high: f64 },
    /// Log-uniform over [low, high); both bounds must be positive.
    LogUniform { low: f64, high: f64 },
    /// Uniform over a finite set of values.
    Choice(Vec<ParamValue>),
}

impl ParamDomain {
    fn sample<R: Rng>(&self, rng: &mut R) -> Result<ParamValue> {
        match self {
            ParamDomain::Point(v) => Ok(v.clone()),
            ParamDomain::Uniform { low, high } => Ok(ParamValue::Float(rng.gen_range(*low..*high))),
            ParamDomain::LogUniform { low, high } => {
                if *low <= 0.0 || *high <= 0.0 {
                    bail!("log-uniform bounds must be positive (got {low}..{high})");
                }
                let exp = rng.gen_range(low.ln()..high.ln());
                Ok(ParamValue::Float(exp.exp()))
            }
            ParamDomain::Choice(options) => {
                let idx = rng.gen_range(0..options.len());
                Ok(options[idx].clone())
            }
        }
    }
}

// ─── Search space ─────────────────────────────────────────────────────────────

/// Mapping from hyperparameter name to its domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    domains: BTreeMap<String, ParamDomain>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, name: impl Into<String>, domain: ParamDomain) -> Self {
        self.domains.insert(name.into(), domain);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Union this (generic) space with a strategy-specific one.
    /// Specific keys override generic keys; a missing specific
    /// space leaves the generic space untouched.
    pub fn merged(&self, specific: Option<&SearchSpace>) -> SearchSpace {
        let mut domains = self.domains.clone();
        if let Some(extra) = specific {
            for (name, domain) in &extra.domains {
                domains.insert(name.clone(), domain.clone());
            }
        }
        SearchSpace { domains }
    }

    /// Draw one configuration point from the space.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<TrialConfig> {
        let mut values = BTreeMap::new();
        for (name, domain) in &self.domains {
            let value = domain
                .sample(rng)
                .with_context(|| format!("sampling hyperparameter '{name}'"))?;
            values.insert(name.clone(), value);
        }
        Ok(TrialConfig { values })
    }

    /// Collapse a space of fixed points into a config. Errors if any
    /// domain is still a distribution — direct training needs a
    /// concrete configuration, not a space to search.
    pub fn require_points(&self) -> Result<TrialConfig> {
        let mut values = BTreeMap::new();
        for (name, domain) in &self.domains {
            match domain {
                ParamDomain::Point(v) => {
                    values.insert(name.clone(), v.clone());
                }
                _ => bail!(
                    "hyperparameter '{name}' is a distribution; run with --validate first \
                     or provide a point value"
                ),
            }
        }
        Ok(TrialConfig { values })
    }
}

// ─── Trial configuration ──────────────────────────────────────────────────────

/// One sampled configuration point. Immutable once handed to a
/// trial — accessors only, no mutation API beyond construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    values: BTreeMap<String, ParamValue>,
}

impl TrialConfig {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, ParamValue)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn f64(&self, name: &str) -> Result<f64> {
        self.values
            .get(name)
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| anyhow!("missing or non-numeric hyperparameter '{name}'"))
    }

    pub fn usize(&self, name: &str) -> Result<usize> {
        let v = self
            .values
            .get(name)
            .and_then(ParamValue::as_i64)
            .ok_or_else(|| anyhow!("missing or non-integer hyperparameter '{name}'"))?;
        usize::try_from(v).map_err(|_| anyhow!("hyperparameter '{name}' must be non-negative"))
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        self.values
            .get(name)
            .and_then(ParamValue::as_text)
            .ok_or_else(|| anyhow!("missing or non-string hyperparameter '{name}'"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generic() -> SearchSpace {
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

    fn replay_specific() -> SearchSpace {
        SearchSpace::new().insert(
            "mem_size",
            ParamDomain::Choice(vec![
                ParamValue::Int(2),
                ParamValue::Int(5),
                ParamValue::Int(10),
            ]),
        )
    }

    #[test]
    fn merge_is_idempotent() {
        let once = generic().merged(Some(&replay_specific()));
        let twice = generic().merged(Some(&replay_specific()));
        assert_eq!(once, twice);
        // Merging an already-merged space with the same specific
        // space changes nothing either.
        assert_eq!(once.merged(Some(&replay_specific())), once);
    }

    #[test]
    fn merge_specific_overrides_generic() {
        let specific = SearchSpace::new().insert("lr", ParamDomain::Point(ParamValue::Float(0.5)));
        let merged = generic().merged(Some(&specific));
        let cfg = merged
            .merged(None)
            .sample(&mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(cfg.f64("lr").unwrap(), 0.5);
    }

    #[test]
    fn merge_without_specific_is_generic_alone() {
        assert_eq!(generic().merged(None), generic());
    }

    #[test]
    fn log_uniform_samples_stay_in_bounds() {
        let space = generic();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let cfg = space.sample(&mut rng).unwrap();
            let lr = cfg.f64("lr").unwrap();
            assert!((1e-4..1e-1).contains(&lr), "lr {lr} out of bounds");
        }
    }

    #[test]
    fn point_space_samples_to_the_point() {
        let space = SearchSpace::new()
            .insert("lr", ParamDomain::Point(ParamValue::Float(0.01)))
            .insert("optimizer", ParamDomain::Point(ParamValue::Text("SGD".into())));
        let mut rng = StdRng::seed_from_u64(3);
        let sampled = space.sample(&mut rng).unwrap();
        assert_eq!(sampled, space.require_points().unwrap());
    }

    #[test]
    fn require_points_rejects_distributions() {
        assert!(generic().require_points().is_err());
    }
}
