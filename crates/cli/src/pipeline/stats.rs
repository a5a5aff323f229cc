//! Pipeline statistics.

use std::time::Duration;

use contracts::Digest;
use dispatcher::MetricsSnapshot;
use observability::{RunningStats, StatsSummary};
use serde::Serialize;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Manifest digest (None when the run did not finish)
    pub digest: Option<Digest>,

    /// Chunks produced from the input
    pub chunks: u64,

    /// Input size in bytes
    pub bytes: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Counters of the chunk push stage
    pub push: MetricsSnapshot,

    /// Counters of the manifest push stage
    pub manifest: MetricsSnapshot,

    /// Chunks delivered to remote peers
    pub delivered: u64,

    /// Chunks held by the local store
    pub stored_locally: usize,

    /// Time each write blocked the caller (ms)
    pub write_latency: RunningStats,
}

/// Flattened view for JSON output
#[derive(Serialize)]
pub struct StatsReport {
    pub digest: Option<String>,
    pub chunks: u64,
    pub bytes: u64,
    pub duration_secs: f64,
    pub push_attempts: u64,
    pub retries: u64,
    pub pushed: u64,
    pub committed_locally: u64,
    pub failures: u64,
    pub peak_in_flight: usize,
    pub delivered: u64,
    pub stored_locally: usize,
}

impl PipelineStats {
    /// Chunks per second throughput
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.chunks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            digest: self.digest.map(|d| d.to_string()),
            chunks: self.chunks,
            bytes: self.bytes,
            duration_secs: self.duration.as_secs_f64(),
            push_attempts: self.push.push_attempts + self.manifest.push_attempts,
            retries: self.push.retries() + self.manifest.retries(),
            pushed: self.push.pushed_count + self.manifest.pushed_count,
            committed_locally: self.push.committed_count + self.manifest.committed_count,
            failures: self.push.failure_count + self.manifest.failure_count,
            peak_in_flight: self.push.peak_in_flight,
            delivered: self.delivered,
            stored_locally: self.stored_locally,
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let report = self.report();

        println!("\n=== Push Statistics ===\n");
        match report.digest {
            Some(ref digest) => println!("Digest: {}", digest),
            None => println!("Digest: <not produced>"),
        }

        println!("\nOverview");
        println!("  Duration: {:.2}s", report.duration_secs);
        println!("  Chunks: {} ({} bytes)", report.chunks, report.bytes);
        println!("  Throughput: {:.2} chunks/s", self.throughput());

        println!("\nPush Stage");
        println!("  Attempts: {}", report.push_attempts);
        println!("  Retries: {}", report.retries);
        println!("  Pushed to peers: {}", report.pushed);
        println!("  Committed locally: {}", report.committed_locally);
        println!("  Failures: {}", report.failures);
        println!("  Peak in flight: {}", report.peak_in_flight);

        println!("\nNetwork");
        println!("  Delivered: {}", report.delivered);
        println!("  Local store: {}", report.stored_locally);

        println!(
            "\nWrite latency (ms): {}",
            StatsSummary::from(&self.write_latency)
        );
        println!();
    }
}
