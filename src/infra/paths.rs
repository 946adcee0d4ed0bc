// ============================================================
// Layer 6 — Run Paths
// ============================================================
// Every artifact location is derived from one RunPaths value that
// is constructed once, at the CLI boundary, from the output
// directory the user chose. Components receive RunPaths (or a path
// derived from it) explicitly; nothing reads a global results
// location.
//
// The tree under <output>/results/:
//
//   results_{data}_{outcome}_{domain}.json          final tables
//   best_configs/best_{...}_{model}_{strategy}.json tuned configs
//   figs/{data}/{outcome}/{domain}/{timestamp}/     rendered plots
//   tb_results/tb_data_{timestamp}/{model}/{strategy}/  metric sinks
//   search_results/{data}_{domain}/{trainable}/     trial artifacts

use std::path::{Path, PathBuf};

/// Root of the run artifact tree.
#[derive(Debug, Clone)]
pub struct RunPaths {
    results_root: PathBuf,
}

impl RunPaths {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            results_root: output_dir.join("results"),
        }
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// The results table for one (data, outcome, domain) context.
    pub fn results_file(&self, data: &str, outcome: &str, domain: &str) -> PathBuf {
        self.results_root
            .join(format!("results_{data}_{outcome}_{domain}.json"))
    }

    /// Persisted best configuration of one (model, strategy) pair.
    pub fn best_config_file(
        &self,
        data: &str,
        outcome: &str,
        domain: &str,
        model: &str,
        strategy: &str,
    ) -> PathBuf {
        self.results_root
            .join("best_configs")
            .join(format!("best_{data}_{outcome}_{domain}_{model}_{strategy}.json"))
    }

    /// Figure directory for one rendering pass, keyed by timestamp
    /// so repeated renders never overwrite each other.
    pub fn fig_dir(&self, data: &str, outcome: &str, domain: &str, timestamp: &str) -> PathBuf {
        self.results_root
            .join("figs")
            .join(data)
            .join(outcome)
            .join(domain)
            .join(timestamp)
    }

    /// Metric sink directory for one (model, strategy) run.
    pub fn tb_dir(&self, timestamp: &str, model: &str, strategy: &str) -> PathBuf {
        self.results_root
            .join("tb_results")
            .join(format!("tb_data_{timestamp}"))
            .join(model)
            .join(strategy)
    }

    /// Trial artifact directory of one hyperparameter search.
    pub fn search_dir(&self, data: &str, domain: &str, trainable: &str) -> PathBuf {
        self.results_root
            .join("search_results")
            .join(format!("{data}_{domain}"))
            .join(trainable)
    }
}

/// Wall-clock run timestamp, second resolution. Two runs started
/// within the same second share artifact directories; sinks append
/// rather than truncate for that reason.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_layout_matches_expected_shapes() {
        let paths = RunPaths::new(Path::new("/tmp/out"));

        assert_eq!(
            paths.results_file("random", "mortality", "region"),
            Path::new("/tmp/out/results/results_random_mortality_region.json")
        );
        assert_eq!(
            paths.fig_dir("random", "mortality", "region", "2024-01-01-00-00-00"),
            Path::new("/tmp/out/results/figs/random/mortality/region/2024-01-01-00-00-00")
        );
        assert_eq!(
            paths.tb_dir("2024-01-01-00-00-00", "MLP", "Replay"),
            Path::new("/tmp/out/results/tb_results/tb_data_2024-01-01-00-00-00/MLP/Replay")
        );
        assert_eq!(
            paths.search_dir("random", "region", "MLP_Replay"),
            Path::new("/tmp/out/results/search_results/random_region/MLP_Replay")
        );
    }

    #[test]
    fn timestamp_has_the_expected_shape() {
        let ts = run_timestamp();
        // YYYY-MM-DD-HH-MM-SS
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.matches('-').count(), 5);
    }
}
