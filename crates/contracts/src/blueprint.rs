//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete push pipeline: stage concurrency and retry policy,
//! the simulated network it pushes into, and how input is chunked.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Default number of concurrent push tasks per stage
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Push stage settings
    #[serde(default)]
    #[validate(nested)]
    pub push: PushConfig,

    /// Simulated network settings
    #[serde(default)]
    #[validate(nested)]
    pub network: NetworkConfig,

    /// Input chunking settings
    #[serde(default)]
    #[validate(nested)]
    pub chunking: ChunkingConfig,
}

/// Push stage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PushConfig {
    /// Maximum concurrent push tasks
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 1024, message = "concurrency must be in 1..=1024"))]
    pub concurrency: usize,

    /// Deadline for the whole pipeline in seconds (None = no deadline)
    #[serde(default)]
    #[validate(range(min = 1, message = "timeout_secs must be > 0"))]
    pub timeout_secs: Option<u64>,

    /// Retry policy between failed push attempts
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

impl PushConfig {
    /// Pipeline deadline, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Retry backoff between push attempts
///
/// Zero initial backoff retries immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay after the first failed attempt (ms)
    #[serde(default)]
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling delay (ms, 0 = no growth)
    #[serde(default)]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Delay to wait after `failures` consecutive failed attempts
    ///
    /// Returns `None` when retries are immediate.
    pub fn backoff(&self, failures: u32) -> Option<Duration> {
        if self.initial_backoff_ms == 0 || failures == 0 {
            return None;
        }
        let cap = self.max_backoff_ms.max(self.initial_backoff_ms);
        let shift = (failures - 1).min(32);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << shift).min(cap);
        Some(Duration::from_millis(delay))
    }
}

/// Simulated network configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NetworkConfig {
    /// Number of remote peers
    #[serde(default = "default_peers")]
    #[validate(range(min = 1, max = 4096, message = "peers must be in 1..=4096"))]
    pub peers: usize,

    /// Seed for overlay addresses and failure injection
    #[serde(default)]
    pub seed: u64,

    /// Probability of a transient push failure
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0, message = "failure_rate must be in 0.0..=1.0"))]
    pub failure_rate: f64,

    /// Simulated per-push latency (ms)
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_peers() -> usize {
    8
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            peers: default_peers(),
            seed: 0,
            failure_rate: 0.0,
            latency_ms: 0,
        }
    }
}

/// Input chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChunkingConfig {
    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 1, max = 1048576, message = "chunk_size must be in 1..=1048576"))]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
