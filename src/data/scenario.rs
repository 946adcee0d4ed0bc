// ============================================================
// Layer 4 — Scenario and Experiences
// ============================================================
// A Scenario is the continual-learning view of a dataset: an
// ordered sequence of "experiences" (tasks), each holding its own
// disjoint train/test partition. The train stream is consumed
// strictly in order, one experience after another, with no
// reordering — that ordering is the whole point of the benchmark.

use crate::data::dataset::EpisodeSample;

/// One task: a train partition the strategy learns from and a
/// held-out test partition for evaluation.
#[derive(Debug, Clone)]
pub struct Experience {
    pub task_id: usize,
    pub train: Vec<EpisodeSample>,
    pub test: Vec<EpisodeSample>,
}

/// The ordered experience sequence of one dataset split.
#[derive(Debug, Clone)]
pub struct Scenario {
    experiences: Vec<Experience>,
}

impl Scenario {
    pub fn new(experiences: Vec<Experience>) -> Self {
        Self { experiences }
    }

    pub fn n_tasks(&self) -> usize {
        self.experiences.len()
    }

    /// The train stream: experiences in task order, to be trained
    /// on sequentially.
    pub fn train_stream(&self) -> &[Experience] {
        &self.experiences
    }

    /// The test stream: same task order, held-out partitions.
    pub fn test_stream(&self) -> &[Experience] {
        &self.experiences
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_preserve_task_order() {
        let experiences = (0..4)
            .map(|task_id| Experience {
                task_id,
                train: vec![EpisodeSample::new(vec![0.0], 0)],
                test: vec![EpisodeSample::new(vec![1.0], 1)],
            })
            .collect();
        let scenario = Scenario::new(experiences);

        assert_eq!(scenario.n_tasks(), 4);
        let ids: Vec<usize> = scenario.train_stream().iter().map(|e| e.task_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
