//! SimulatedNetwork - in-process overlay replicating chunks to peers
//!
//! Overlay addresses are derived from a seed, so the same configuration always
//! yields the same topology. The closest address (XOR distance) to a chunk is
//! its destination; when that is the local node the push reports `WantSelf`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use contracts::{Address, Chunk, NetworkConfig, PushError, Receipt, Replicator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{instrument, trace};

/// Replicator backed by a simulated peer set
#[derive(Debug)]
pub struct SimulatedNetwork {
    local: Address,
    peers: Vec<Address>,
    failure_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
    deliveries: Mutex<HashMap<Address, u64>>,
    attempts: AtomicU64,
}

impl SimulatedNetwork {
    /// Network of `peers` remote nodes derived from `seed`
    pub fn new(peers: usize, seed: u64) -> Self {
        let local = Address::from_content(format!("overlay/{seed}/local").as_bytes());
        let peers = (0..peers)
            .map(|i| Address::from_content(format!("overlay/{seed}/peer/{i}").as_bytes()))
            .collect();

        Self {
            local,
            peers,
            failure_rate: 0.0,
            latency: Duration::ZERO,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            deliveries: Mutex::default(),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.peers, config.seed)
            .with_failure_rate(config.failure_rate)
            .with_latency(Duration::from_millis(config.latency_ms))
    }

    /// Probability that a push to a remote peer fails transiently
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    /// Delay of every push to a remote peer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn local_address(&self) -> &Address {
        &self.local
    }

    pub fn peers(&self) -> &[Address] {
        &self.peers
    }

    /// Overlay address closest to `target`, local node included
    pub fn closest(&self, target: &Address) -> Address {
        self.peers
            .iter()
            .fold(self.local, |best, peer| {
                if target.distance_cmp(peer, &best).is_lt() {
                    *peer
                } else {
                    best
                }
            })
    }

    /// Chunks delivered to `peer`
    pub fn deliveries_to(&self, peer: &Address) -> u64 {
        self.lock_deliveries().get(peer).copied().unwrap_or(0)
    }

    /// Chunks delivered across all peers
    pub fn total_delivered(&self) -> u64 {
        self.lock_deliveries().values().sum()
    }

    /// Push calls received, local destinations included
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn lock_deliveries(&self) -> std::sync::MutexGuard<'_, HashMap<Address, u64>> {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn roll_failure(&self) -> bool {
        if self.failure_rate <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_bool(self.failure_rate)
    }
}

impl Replicator for SimulatedNetwork {
    #[instrument(
        name = "simulated_push",
        skip(self, chunk),
        fields(address = %chunk.address().short())
    )]
    async fn push_to_closest(&self, chunk: &Chunk) -> Result<Receipt, PushError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let storer = self.closest(chunk.address());
        if storer == self.local {
            trace!("local node is closest");
            return Err(PushError::WantSelf);
        }

        let failed = self.roll_failure();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if failed {
            return Err(PushError::transport(format!(
                "peer {} did not acknowledge",
                storer.short()
            )));
        }

        *self.lock_deliveries().entry(storer).or_insert(0) += 1;
        trace!(storer = %storer.short(), "chunk delivered");

        Ok(Receipt {
            address: *chunk.address(),
            storer,
        })
    }
}
