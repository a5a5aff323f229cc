//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Push stage behaviour against instrumented collaborators
//! - End-to-end pipelines over the simulated network
//! - Configuration loading

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        Address, ChainWriter, Chunk, ContractError, Digest, LocalCommitter, PushError, PutMode,
        Receipt, Replicator, WriteUnit,
    };

    /// How the instrumented replicator answers
    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        Succeed,
        WantSelf,
        /// Fail this many times per chunk, then succeed
        FailTimes(u64),
        FailForever,
    }

    /// Replicator recording calls and concurrency
    pub struct TestReplicator {
        behavior: Behavior,
        delay: Duration,
        delays: HashMap<Address, Duration>,
        calls: AtomicU64,
        completed: AtomicU64,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        failures: Mutex<HashMap<Address, u64>>,
    }

    impl TestReplicator {
        pub fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                delay: Duration::ZERO,
                delays: HashMap::new(),
                calls: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                failures: Mutex::default(),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Per-chunk delay overriding the default one
        pub fn with_chunk_delay(mut self, address: Address, delay: Duration) -> Self {
            self.delays.insert(address, delay);
            self
        }

        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        /// Calls that returned, whatever the result
        pub fn completed(&self) -> u64 {
            self.completed.load(Ordering::SeqCst)
        }

        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn fail_now(&self, address: &Address, times: u64) -> bool {
            let mut failures = self.failures.lock().unwrap();
            let count = failures.entry(*address).or_insert(0);
            if *count < times {
                *count += 1;
                true
            } else {
                false
            }
        }
    }

    impl Replicator for TestReplicator {
        async fn push_to_closest(&self, chunk: &Chunk) -> Result<Receipt, PushError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(chunk.address()).copied().unwrap_or(self.delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::WantSelf => Err(PushError::WantSelf),
                Behavior::FailTimes(times) => {
                    if self.fail_now(chunk.address(), times) {
                        Err(PushError::transport("scripted failure"))
                    } else {
                        Ok(())
                    }
                }
                Behavior::FailForever => Err(PushError::transport("unreachable")),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
            result.map(|()| Receipt {
                address: *chunk.address(),
                storer: Address::ZERO,
            })
        }
    }

    /// Local committer recording every put
    #[derive(Default)]
    pub struct TestCommitter {
        puts: Mutex<Vec<(PutMode, Address)>>,
        fail: bool,
        stall: bool,
    }

    impl TestCommitter {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Committer whose `put` never resolves
        pub fn stalled() -> Self {
            Self {
                stall: true,
                ..Self::default()
            }
        }

        pub fn puts(&self) -> Vec<(PutMode, Address)> {
            self.puts.lock().unwrap().clone()
        }
    }

    impl LocalCommitter for TestCommitter {
        async fn put(&self, mode: PutMode, chunk: &Chunk) -> Result<bool, ContractError> {
            self.puts.lock().unwrap().push((mode, *chunk.address()));
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(ContractError::store("test", "disk full"));
            }
            Ok(false)
        }
    }

    /// Shared view of what a [`RecordingWriter`] saw
    #[derive(Default)]
    pub struct Recorded {
        pub units: Mutex<Vec<WriteUnit>>,
        pub summed: AtomicBool,
        /// Replicator calls completed when `sum` ran
        pub completed_at_sum: AtomicU64,
    }

    /// Downstream writer recording units and the moment it is finalized
    pub struct RecordingWriter {
        pub recorded: Arc<Recorded>,
        replicator: Option<Arc<TestReplicator>>,
        digest: Digest,
    }

    impl RecordingWriter {
        pub fn new(digest: Digest) -> Self {
            Self {
                recorded: Arc::default(),
                replicator: None,
                digest,
            }
        }

        pub fn observing(mut self, replicator: Arc<TestReplicator>) -> Self {
            self.replicator = Some(replicator);
            self
        }
    }

    impl ChainWriter for RecordingWriter {
        async fn chain_write(&mut self, unit: WriteUnit) -> Result<(), ContractError> {
            self.recorded.units.lock().unwrap().push(unit);
            Ok(())
        }

        async fn sum(&mut self) -> Result<Digest, ContractError> {
            if let Some(replicator) = &self.replicator {
                self.recorded
                    .completed_at_sum
                    .store(replicator.completed(), Ordering::SeqCst);
            }
            self.recorded.summed.store(true, Ordering::SeqCst);
            Ok(self.digest)
        }
    }

    pub fn unit(n: u32) -> WriteUnit {
        Chunk::from_content(format!("chunk-{n}")).into()
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{
        Address, ConfigVersion, PipelineBlueprint, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY,
        WriteUnit,
    };

    #[test]
    fn test_default_blueprint() {
        let blueprint = PipelineBlueprint::default();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.push.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(blueprint.push.timeout(), None);
        assert_eq!(blueprint.chunking.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_write_unit_requires_both_fields() {
        let only_address = WriteUnit {
            address: Some(Address::ZERO),
            payload: None,
        };
        assert!(only_address.to_chunk().is_err());
        assert!(WriteUnit::default().to_chunk().is_err());
    }
}

#[cfg(test)]
mod stage_tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{Address, ContractError, PutMode, RetryConfig, WriteUnit};
    use dispatcher::{ManifestWriter, PushStage, PushStageBuilder};
    use tokio_util::sync::CancellationToken;

    use crate::support::{unit, Behavior, RecordingWriter, TestCommitter, TestReplicator};

    #[tokio::test]
    async fn test_invalid_unit_consumes_nothing() {
        let replicator = Arc::new(TestReplicator::new(Behavior::Succeed));
        let writer = RecordingWriter::new(Address::ZERO);
        let recorded = Arc::clone(&writer.recorded);
        let mut stage = PushStageBuilder::new(Arc::clone(&replicator), Arc::new(TestCommitter::default()))
            .concurrency(2)
            .chained(writer)
            .unwrap();

        let missing_payload = WriteUnit {
            address: Some(Address::ZERO),
            payload: None,
        };
        let err = stage.write(missing_payload).await.unwrap_err();

        assert!(matches!(err, ContractError::InvalidData { missing: "payload" }));
        assert_eq!(replicator.calls(), 0);
        assert_eq!(stage.available_slots(), 2);
        assert!(recorded.units.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_peak_concurrency_bounded() {
        let replicator =
            Arc::new(TestReplicator::new(Behavior::Succeed).with_delay(Duration::from_millis(20)));
        let mut stage = PushStageBuilder::new(Arc::clone(&replicator), Arc::new(TestCommitter::default()))
            .concurrency(3)
            .chained(RecordingWriter::new(Address::ZERO))
            .unwrap();

        for n in 0..20 {
            stage.write(unit(n)).await.unwrap();
            assert!(stage.metrics().in_flight() <= 3);
        }
        stage.finalize().await.unwrap();

        assert_eq!(replicator.calls(), 20);
        assert!(replicator.peak() <= 3);
        assert!(stage.metrics().peak_in_flight() <= 3);
        assert_eq!(stage.available_slots(), 3);
    }

    #[tokio::test]
    async fn test_want_self_commits_once_per_chunk() {
        let replicator = Arc::new(TestReplicator::new(Behavior::WantSelf));
        let committer = Arc::new(TestCommitter::default());
        let mut stage = PushStage::chained(
            Arc::clone(&replicator),
            Arc::clone(&committer),
            RecordingWriter::new(Address::ZERO),
        );

        let units: Vec<_> = (0..4).map(unit).collect();
        for u in &units {
            stage.write(u.clone()).await.unwrap();
        }
        stage.finalize().await.unwrap();

        assert_eq!(replicator.calls(), 4);
        let puts = committer.puts();
        assert_eq!(puts.len(), 4);
        assert!(puts.iter().all(|(mode, _)| *mode == PutMode::Sync));
        for u in &units {
            assert!(puts.iter().any(|(_, a)| Some(*a) == u.address));
        }
        assert_eq!(stage.metrics().committed_count(), 4);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        const K: u64 = 5;
        let replicator = Arc::new(TestReplicator::new(Behavior::FailTimes(K)));
        let mut stage = PushStage::chained(
            Arc::clone(&replicator),
            Arc::new(TestCommitter::default()),
            RecordingWriter::new(Address::ZERO),
        );

        stage.write(unit(1)).await.unwrap();
        stage.finalize().await.unwrap();

        assert_eq!(replicator.calls(), K + 1);
        let snapshot = stage.metrics().snapshot();
        assert_eq!(snapshot.push_attempts, K + 1);
        assert_eq!(snapshot.retries(), K);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn test_finalize_waits_for_slowest_task() {
        let slow = unit(99);
        let slow_address = slow.address.unwrap();
        let replicator = Arc::new(
            TestReplicator::new(Behavior::Succeed)
                .with_delay(Duration::from_millis(5))
                .with_chunk_delay(slow_address, Duration::from_millis(150)),
        );
        let writer = RecordingWriter::new(Address::from_content(b"digest"))
            .observing(Arc::clone(&replicator));
        let recorded = Arc::clone(&writer.recorded);
        let mut stage = PushStage::chained(
            Arc::clone(&replicator),
            Arc::new(TestCommitter::default()),
            writer,
        );

        stage.write(slow).await.unwrap();
        for n in 0..3 {
            stage.write(unit(n)).await.unwrap();
        }
        // Forwarding does not wait for replication
        assert_eq!(recorded.units.lock().unwrap().len(), 4);
        assert!(!recorded.summed.load(Ordering::SeqCst));

        let digest = stage.finalize().await.unwrap();

        assert_eq!(digest, Address::from_content(b"digest"));
        assert_eq!(recorded.completed_at_sum.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cancellation_during_retry() {
        let token = CancellationToken::new();
        let replicator = Arc::new(TestReplicator::new(Behavior::FailForever));
        let writer = RecordingWriter::new(Address::ZERO);
        let recorded = Arc::clone(&writer.recorded);
        let mut stage = PushStageBuilder::new(Arc::clone(&replicator), Arc::new(TestCommitter::default()))
            .retry(RetryConfig {
                initial_backoff_ms: 5,
                max_backoff_ms: 20,
            })
            .cancellation(token.clone())
            .chained(writer)
            .unwrap();

        stage.write(unit(1)).await.unwrap();
        stage.write(unit(2)).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = stage.finalize().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(replicator.calls() >= 2);
        assert!(!recorded.summed.load(Ordering::SeqCst));
        assert_eq!(stage.metrics().in_flight(), 0);
        assert_eq!(stage.metrics().failure_count(), 2);
    }

    #[tokio::test]
    async fn test_terminal_write_cancelled() {
        let token = CancellationToken::new();
        let mut stage = PushStageBuilder::new(
            Arc::new(TestReplicator::new(Behavior::FailForever)),
            Arc::new(TestCommitter::default()),
        )
        .cancellation(token.clone())
        .terminal()
        .unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let err = stage.write(unit(1)).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_slot() {
        let token = CancellationToken::new();
        let replicator = Arc::new(TestReplicator::new(Behavior::FailForever));
        let mut stage = PushStageBuilder::new(Arc::clone(&replicator), Arc::new(TestCommitter::default()))
            .concurrency(1)
            .retry(RetryConfig {
                initial_backoff_ms: 5,
                max_backoff_ms: 5,
            })
            .cancellation(token.clone())
            .chained(RecordingWriter::new(Address::ZERO))
            .unwrap();

        stage.write(unit(1)).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        // Pool is full; blocks until cancelled, then launches nothing
        let err = stage.write(unit(2)).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(stage.metrics().tasks_started(), 1);
        assert_eq!(stage.downstream().unwrap().recorded.units.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_local_commit_failure_surfaces() {
        let writer = RecordingWriter::new(Address::ZERO);
        let recorded = Arc::clone(&writer.recorded);
        let mut stage = PushStage::chained(
            Arc::new(TestReplicator::new(Behavior::WantSelf)),
            Arc::new(TestCommitter::failing()),
            writer,
        );

        stage.write(unit(1)).await.unwrap();
        let err = stage.finalize().await.unwrap_err();

        assert!(matches!(err, ContractError::LocalCommit { .. }));
        assert!(!recorded.summed.load(Ordering::SeqCst));

        // Failure is sticky
        let err = stage.finalize().await.unwrap_err();
        assert!(matches!(err, ContractError::LocalCommit { .. }));
    }

    #[tokio::test]
    async fn test_terminal_write_cancelled_during_local_commit() {
        let token = CancellationToken::new();
        let committer = Arc::new(TestCommitter::stalled());
        let mut stage = PushStageBuilder::new(
            Arc::new(TestReplicator::new(Behavior::WantSelf)),
            Arc::clone(&committer),
        )
        .cancellation(token.clone())
        .terminal()
        .unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(1), stage.write(unit(1)))
            .await
            .expect("write should return once cancelled")
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(committer.puts().len(), 1);
        assert_eq!(stage.metrics().in_flight(), 0);
        assert_eq!(stage.metrics().committed_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_cancelled_during_local_commit() {
        let token = CancellationToken::new();
        let writer = RecordingWriter::new(Address::ZERO);
        let recorded = Arc::clone(&writer.recorded);
        let mut stage = PushStageBuilder::new(
            Arc::new(TestReplicator::new(Behavior::WantSelf)),
            Arc::new(TestCommitter::stalled()),
        )
        .cancellation(token.clone())
        .chained(writer)
        .unwrap();

        stage.write(unit(1)).await.unwrap();
        stage.write(unit(2)).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(1), stage.finalize())
            .await
            .expect("finalize should return once cancelled")
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!recorded.summed.load(Ordering::SeqCst));
        assert_eq!(stage.metrics().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_terminal_stage_has_no_writer() {
        let replicator = Arc::new(TestReplicator::new(Behavior::Succeed));
        let mut stage = PushStage::terminal(Arc::clone(&replicator), Arc::new(TestCommitter::default()));

        stage.write(unit(1)).await.unwrap();
        assert_eq!(replicator.completed(), 1);

        let err = stage.finalize().await.unwrap_err();
        assert!(matches!(err, ContractError::NoTerminalWriter));
    }

    #[tokio::test]
    async fn test_end_to_end_pool_of_two() {
        let replicator = Arc::new(TestReplicator::new(Behavior::Succeed));
        let mut stage = PushStageBuilder::new(Arc::clone(&replicator), Arc::new(TestCommitter::default()))
            .concurrency(2)
            .chained(ManifestWriter::standalone())
            .unwrap();
        let mut expected = ManifestWriter::standalone();

        for n in 0..3 {
            stage.write(unit(n)).await.unwrap();
            dispatcher::ChainWriter::chain_write(&mut expected, unit(n))
                .await
                .unwrap();
        }
        let digest = stage.finalize().await.unwrap();

        assert_eq!(digest, dispatcher::ChainWriter::sum(&mut expected).await.unwrap());
        assert_eq!(replicator.calls(), 3);
        assert!(replicator.peak() <= 2);
        assert_eq!(stage.metrics().pushed_count(), 3);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use contracts::{Chunk, PutMode};
    use dispatcher::{LogWriter, ManifestWriter, MemoryStore, PushStageBuilder, SimulatedNetwork};

    /// PushStage -> LogWriter -> ManifestWriter -> terminal PushStage
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_simulated_pipeline() {
        let network = Arc::new(SimulatedNetwork::new(3, 42).with_failure_rate(0.3));
        let store = Arc::new(MemoryStore::new());

        let manifest_stage = PushStageBuilder::new(Arc::clone(&network), Arc::clone(&store))
            .concurrency(2)
            .terminal()
            .unwrap();
        let writer = LogWriter::new("e2e", ManifestWriter::new(manifest_stage));
        let mut stage = PushStageBuilder::new(Arc::clone(&network), Arc::clone(&store))
            .concurrency(4)
            .chained(writer)
            .unwrap();

        let chunks: Vec<Chunk> = (0..32)
            .map(|i| Chunk::from_content(Bytes::from(format!("payload number {i}"))))
            .collect();
        for chunk in &chunks {
            stage.write(chunk.clone().into()).await.unwrap();
        }
        let digest = stage.finalize().await.unwrap();

        // Every chunk plus the manifest settled either remotely or locally
        let local = *network.local_address();
        let expected_local = chunks
            .iter()
            .filter(|c| network.closest(c.address()) == local)
            .count()
            + usize::from(network.closest(&digest) == local);
        assert_eq!(store.len(), expected_local);
        assert_eq!(network.total_delivered() as usize + expected_local, chunks.len() + 1);

        for chunk in chunks.iter().filter(|c| network.closest(c.address()) == local) {
            assert_eq!(store.mode(chunk.address()), Some(PutMode::Sync));
        }

        let log = stage.downstream().unwrap();
        assert_eq!(log.units(), 32);
        assert_eq!(log.inner().len(), 32);
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::ContractError;

    #[test]
    fn test_full_toml_config() {
        let toml = r#"
            [push]
            concurrency = 16
            timeout_secs = 30

            [push.retry]
            initial_backoff_ms = 10
            max_backoff_ms = 500

            [network]
            peers = 12
            seed = 7
            failure_rate = 0.1
            latency_ms = 2

            [chunking]
            chunk_size = 1024
        "#;

        let bp = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.push.concurrency, 16);
        assert_eq!(bp.push.retry.max_backoff_ms, 500);
        assert_eq!(bp.network.peers, 12);
        assert_eq!(bp.chunking.chunk_size, 1024);
    }

    #[test]
    fn test_out_of_range_failure_rate() {
        let err = ConfigLoader::load_from_str("[network]\nfailure_rate = 1.5", ConfigFormat::Toml)
            .unwrap_err();
        match err {
            ContractError::ConfigValidation { field, .. } => {
                assert_eq!(field, "network.failure_rate")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
