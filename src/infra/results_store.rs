// ============================================================
// Layer 6 — Results Store
// ============================================================
// JSON persistence for the two durable artifacts of a run: the
// results table and the best configuration a search found for a
// (model, strategy) pair. Loading a missing best config is not an
// error — the caller decides whether a fallback exists.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::results::ResultsTable;
use crate::domain::search_space::TrialConfig;
use crate::infra::paths::RunPaths;

/// Write the results table to its canonical location; returns the
/// path written.
pub fn save_results(paths: &RunPaths, table: &ResultsTable) -> Result<PathBuf> {
    let file = paths.results_file(&table.data, &table.outcome, &table.domain);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating results directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(table).context("serializing results table")?;
    fs::write(&file, json).with_context(|| format!("writing '{}'", file.display()))?;
    Ok(file)
}

/// Load the results table of one (data, outcome, domain) context.
pub fn load_results(
    paths: &RunPaths,
    data: &str,
    outcome: &str,
    domain: &str,
) -> Result<ResultsTable> {
    let file = paths.results_file(data, outcome, domain);
    let json = fs::read_to_string(&file)
        .with_context(|| format!("reading results table '{}'", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing '{}'", file.display()))
}

/// Persist the best configuration a search produced.
pub fn save_best_config(
    paths: &RunPaths,
    data: &str,
    outcome: &str,
    domain: &str,
    model: &str,
    strategy: &str,
    config: &TrialConfig,
) -> Result<PathBuf> {
    let file = paths.best_config_file(data, outcome, domain, model, strategy);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("serializing best config")?;
    fs::write(&file, json).with_context(|| format!("writing '{}'", file.display()))?;
    Ok(file)
}

/// Load a previously tuned configuration, if one exists.
pub fn try_load_best_config(
    paths: &RunPaths,
    data: &str,
    outcome: &str,
    domain: &str,
    model: &str,
    strategy: &str,
) -> Result<Option<TrialConfig>> {
    let file = paths.best_config_file(data, outcome, domain, model, strategy);
    if !file.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&file)
        .with_context(|| format!("reading best config '{}'", file.display()))?;
    let config =
        serde_json::from_str(&json).with_context(|| format!("parsing '{}'", file.display()))?;
    Ok(Some(config))
}
