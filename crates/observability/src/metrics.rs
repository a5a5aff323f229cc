//! Push pipeline metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory running
//! statistics helper used for end-of-run summaries.

use contracts::PutMode;
use metrics::{counter, gauge, histogram};

/// Result of a single push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Chunk accepted by a peer
    Pushed,
    /// Local node is the closest peer
    WantSelf,
    /// Transient failure, will be retried
    Retry,
}

impl PushOutcome {
    fn as_str(self) -> &'static str {
        match self {
            PushOutcome::Pushed => "pushed",
            PushOutcome::WantSelf => "want_self",
            PushOutcome::Retry => "retry",
        }
    }
}

/// Terminal state of a push task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Replicated to the network
    Pushed,
    /// Committed to local storage
    Committed,
    /// Cancelled before completing
    Cancelled,
    /// Local commit failed or task panicked
    Failed,
}

impl TaskOutcome {
    fn as_str(self) -> &'static str {
        match self {
            TaskOutcome::Pushed => "pushed",
            TaskOutcome::Committed => "committed",
            TaskOutcome::Cancelled => "cancelled",
            TaskOutcome::Failed => "failed",
        }
    }
}

/// Record one push attempt
pub fn record_push_attempt(outcome: PushOutcome) {
    counter!("chunk_push_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record a finished push task and its duration
pub fn record_task_finished(outcome: TaskOutcome, duration_ms: f64) {
    counter!("chunk_push_tasks_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("chunk_push_task_duration_ms").record(duration_ms);
}

/// Record a local commit on the self-as-destination path
pub fn record_local_commit(mode: PutMode, success: bool) {
    let status = if success { "success" } else { "failure" };
    let mode = match mode {
        PutMode::Upload => "upload",
        PutMode::Sync => "sync",
        PutMode::Request => "request",
    };
    counter!(
        "chunk_push_local_commits_total",
        "mode" => mode,
        "status" => status
    )
    .increment(1);
}

/// A task took a slot
///
/// The gauge is shared by every stage in the process, so it moves by deltas
/// rather than being set from one stage's count.
pub fn record_slot_acquired() {
    gauge!("chunk_push_in_flight").increment(1.0);
}

/// A task gave its slot back
pub fn record_slot_released() {
    gauge!("chunk_push_in_flight").decrement(1.0);
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean / variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Merge another set of samples into this one
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;

        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
        self.mean = mean;
        self.m2 = m2;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
