//! PushTask - retry loop for a single chunk

use std::sync::Arc;
use std::time::Instant;

use contracts::{Chunk, ContractError, LocalCommitter, PushError, PutMode, Replicator, RetryConfig};
use observability::{
    record_local_commit, record_push_attempt, record_slot_acquired, record_slot_released,
    record_task_finished, PushOutcome, TaskOutcome,
};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::metrics::DispatchMetrics;

/// Slot held by a running task
///
/// Releases the semaphore permit and the in-flight count on drop, so every
/// exit path of the task gives the slot back.
pub(crate) struct Slot {
    _permit: OwnedSemaphorePermit,
    metrics: Arc<DispatchMetrics>,
}

impl Slot {
    pub(crate) fn new(permit: OwnedSemaphorePermit, metrics: Arc<DispatchMetrics>) -> Self {
        metrics.task_started();
        record_slot_acquired();
        Self {
            _permit: permit,
            metrics,
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.metrics.task_finished();
        record_slot_released();
    }
}

/// One in-flight replication of one chunk
pub(crate) struct PushTask<R, L> {
    pub(crate) replicator: Arc<R>,
    pub(crate) committer: Arc<L>,
    pub(crate) chunk: Chunk,
    pub(crate) cancel: CancellationToken,
    pub(crate) retry: RetryConfig,
    pub(crate) metrics: Arc<DispatchMetrics>,
}

impl<R, L> PushTask<R, L>
where
    R: Replicator + Sync + 'static,
    L: LocalCommitter + Sync + 'static,
{
    /// Run the task to completion, holding `slot` until it ends
    #[instrument(
        name = "push_task",
        skip(self, slot),
        fields(address = %self.chunk.address().short())
    )]
    pub(crate) async fn run(self, slot: Slot) -> Result<(), ContractError> {
        let started = Instant::now();
        let result = self.replicate().await;
        drop(slot);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(outcome) => record_task_finished(*outcome, elapsed_ms),
            Err(err) => {
                self.metrics.inc_failure_count();
                let outcome = if err.is_cancelled() {
                    TaskOutcome::Cancelled
                } else {
                    TaskOutcome::Failed
                };
                record_task_finished(outcome, elapsed_ms);
                debug!(error = %err, "push task failed");
            }
        }

        result.map(|_| ())
    }

    async fn replicate(&self) -> Result<TaskOutcome, ContractError> {
        let mut failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ContractError::Cancelled);
            }

            self.metrics.inc_push_attempts();
            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ContractError::Cancelled),
                result = self.replicator.push_to_closest(&self.chunk) => result,
            };

            match attempt {
                Ok(receipt) => {
                    record_push_attempt(PushOutcome::Pushed);
                    self.metrics.inc_pushed_count();
                    debug!(
                        storer = %receipt.storer.short(),
                        attempts = failures + 1,
                        "chunk pushed"
                    );
                    return Ok(TaskOutcome::Pushed);
                }
                Err(PushError::WantSelf) => {
                    record_push_attempt(PushOutcome::WantSelf);
                    return self.commit_locally().await;
                }
                Err(err) => {
                    record_push_attempt(PushOutcome::Retry);
                    failures = failures.saturating_add(1);
                    trace!(attempt = failures, error = %err, "push failed, retrying");
                    self.pause(failures).await?;
                }
            }
        }
    }

    /// The protocol layer already replicated the chunk; persist it as synced.
    async fn commit_locally(&self) -> Result<TaskOutcome, ContractError> {
        let put = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ContractError::Cancelled),
            result = self.committer.put(PutMode::Sync, &self.chunk) => result,
        };

        match put {
            Ok(existed) => {
                record_local_commit(PutMode::Sync, true);
                self.metrics.inc_committed_count();
                debug!(existed, "closest peer is self, chunk committed locally");
                Ok(TaskOutcome::Committed)
            }
            Err(err) => {
                record_local_commit(PutMode::Sync, false);
                warn!(error = %err, "local commit failed");
                Err(ContractError::local_commit(
                    *self.chunk.address(),
                    err.to_string(),
                ))
            }
        }
    }

    async fn pause(&self, failures: u32) -> Result<(), ContractError> {
        match self.retry.backoff(failures) {
            Some(delay) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ContractError::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::task::yield_now().await;
                Ok(())
            }
        }
    }
}
