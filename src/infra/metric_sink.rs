// ============================================================
// Layer 6 — Metric Sink
// ============================================================
// Append-only CSV log of per-epoch evaluation metrics, one sink
// per (run, model, strategy). Created as a side effect of strategy
// construction so the directory exists before training starts.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const CSV_HEADER: &str = "experience,epoch,stream,loss,accuracy";

#[derive(Debug)]
pub struct MetricSink {
    csv_path: PathBuf,
}

impl MetricSink {
    /// Create the sink directory and its CSV. An existing CSV is
    /// kept and appended to (same-second run collisions).
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating metric sink directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            fs::write(&csv_path, format!("{CSV_HEADER}\n"))
                .with_context(|| format!("writing '{}'", csv_path.display()))?;
        }
        Ok(Self { csv_path })
    }

    /// Append one eval record.
    pub fn log(
        &self,
        experience: usize,
        epoch: usize,
        stream: &str,
        loss: f64,
        accuracy: f64,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("opening '{}'", self.csv_path.display()))?;
        writeln!(file, "{experience},{epoch},{stream},{loss:.6},{accuracy:.6}")
            .with_context(|| format!("appending to '{}'", self.csv_path.display()))?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("clinical-cl-sink-{tag}-{}", std::process::id()))
    }

    #[test]
    fn sink_writes_header_and_appends_records() {
        let dir = temp_dir("basic");
        let _ = fs::remove_dir_all(&dir);

        let sink = MetricSink::create(&dir).unwrap();
        sink.log(0, 1, "test", 0.693, 0.5).unwrap();
        sink.log(0, 2, "test", 0.61, 0.62).unwrap();

        let contents = fs::read_to_string(sink.csv_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,1,test,"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn recreating_a_sink_appends_instead_of_truncating() {
        let dir = temp_dir("reopen");
        let _ = fs::remove_dir_all(&dir);

        let first = MetricSink::create(&dir).unwrap();
        first.log(0, 1, "train", 1.0, 0.4).unwrap();

        let second = MetricSink::create(&dir).unwrap();
        second.log(1, 1, "train", 0.8, 0.5).unwrap();

        let contents = fs::read_to_string(second.csv_path()).unwrap();
        assert_eq!(contents.lines().count(), 3);

        fs::remove_dir_all(&dir).unwrap();
    }
}
