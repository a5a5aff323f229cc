//! Push stage metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single push stage
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Tasks currently holding a slot
    in_flight: AtomicUsize,
    /// Highest `in_flight` ever observed
    peak_in_flight: AtomicUsize,
    /// Tasks launched
    tasks_started: AtomicU64,
    /// Push attempts across all tasks
    push_attempts: AtomicU64,
    /// Tasks that replicated to the network
    pushed_count: AtomicU64,
    /// Tasks that committed locally (self-as-destination)
    committed_count: AtomicU64,
    /// Tasks that ended in a terminal failure
    failure_count: AtomicU64,
    /// Write units rejected as malformed
    invalid_count: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    /// A task acquired a slot; returns the new in-flight count
    pub fn task_started(&self) -> usize {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        now
    }

    /// A task released its slot; returns the new in-flight count
    pub fn task_finished(&self) -> usize {
        self.in_flight.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn tasks_started(&self) -> u64 {
        self.tasks_started.load(Ordering::Relaxed)
    }

    pub fn push_attempts(&self) -> u64 {
        self.push_attempts.load(Ordering::Relaxed)
    }

    pub fn inc_push_attempts(&self) {
        self.push_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pushed_count(&self) -> u64 {
        self.pushed_count.load(Ordering::Relaxed)
    }

    pub fn inc_pushed_count(&self) {
        self.pushed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn committed_count(&self) -> u64 {
        self.committed_count.load(Ordering::Relaxed)
    }

    pub fn inc_committed_count(&self) {
        self.committed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_count(&self) -> u64 {
        self.invalid_count.load(Ordering::Relaxed)
    }

    pub fn inc_invalid_count(&self) {
        self.invalid_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            tasks_started: self.tasks_started(),
            push_attempts: self.push_attempts(),
            pushed_count: self.pushed_count(),
            committed_count: self.committed_count(),
            failure_count: self.failure_count(),
            invalid_count: self.invalid_count(),
        }
    }
}

/// Snapshot of push stage metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub tasks_started: u64,
    pub push_attempts: u64,
    pub pushed_count: u64,
    pub committed_count: u64,
    pub failure_count: u64,
    pub invalid_count: u64,
}

impl MetricsSnapshot {
    /// Tasks that reached a terminal state
    pub fn tasks_finished(&self) -> u64 {
        self.pushed_count + self.committed_count + self.failure_count
    }

    /// Attempts that did not settle their task
    pub fn retries(&self) -> u64 {
        self.push_attempts
            .saturating_sub(self.pushed_count + self.committed_count)
    }
}
