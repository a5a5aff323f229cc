//! PushStage - bounded, retrying chunk replication stage
//!
//! Every accepted unit becomes a push task that holds one of `concurrency`
//! slots until it settles. A chained stage forwards units downstream while
//! replication runs; a terminal stage drains every outstanding task before
//! a write returns. Either way, the digest is only released once all tasks
//! have finished.

use std::sync::Arc;

use contracts::{
    ChainWriter, Chunk, ContractError, Digest, LocalCommitter, PushConfig, Replicator,
    RetryConfig, WriteUnit, DEFAULT_CONCURRENCY,
};
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::group::TaskGroup;
use crate::metrics::DispatchMetrics;
use crate::task::{PushTask, Slot};

/// Downstream of a push stage
#[derive(Debug)]
pub enum Downstream<W> {
    /// No next stage: writes block until replication has drained
    Terminal,
    /// Units are forwarded to the next stage
    Chained(W),
}

/// Downstream type of a terminal stage; has no values
#[derive(Debug)]
pub enum Unchained {}

impl ChainWriter for Unchained {
    async fn chain_write(&mut self, _unit: WriteUnit) -> Result<(), ContractError> {
        match *self {}
    }

    async fn sum(&mut self) -> Result<Digest, ContractError> {
        match *self {}
    }
}

/// Builder for creating a PushStage
pub struct PushStageBuilder<R, L> {
    replicator: Arc<R>,
    committer: Arc<L>,
    config: PushConfig,
    cancel: Option<CancellationToken>,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl<R, L> PushStageBuilder<R, L>
where
    R: Replicator + Sync + 'static,
    L: LocalCommitter + Sync + 'static,
{
    /// Create a builder with default configuration
    pub fn new(replicator: Arc<R>, committer: Arc<L>) -> Self {
        Self {
            replicator,
            committer,
            config: PushConfig::default(),
            cancel: None,
            metrics: None,
        }
    }

    /// Use a full push configuration
    pub fn config(mut self, config: PushConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of concurrent push tasks
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Retry backoff policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Share a cancellation token with the enclosing operation
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Share a metrics instance (e.g. across stages)
    pub fn metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build a stage with no downstream
    pub fn terminal(self) -> Result<PushStage<R, L, Unchained>, DispatcherError> {
        self.build(Downstream::Terminal)
    }

    /// Build a stage forwarding to `next`
    pub fn chained<W: ChainWriter>(self, next: W) -> Result<PushStage<R, L, W>, DispatcherError> {
        self.build(Downstream::Chained(next))
    }

    /// Build and start the stage
    #[instrument(
        name = "push_stage_build",
        skip(self, downstream),
        fields(concurrency = self.config.concurrency)
    )]
    pub fn build<W: ChainWriter>(
        self,
        downstream: Downstream<W>,
    ) -> Result<PushStage<R, L, W>, DispatcherError> {
        if self.config.concurrency == 0 {
            return Err(DispatcherError::InvalidConcurrency(self.config.concurrency));
        }

        let cancel = self.cancel.unwrap_or_default();
        let deadline = match self.config.timeout() {
            Some(timeout) => {
                let handle = tokio::runtime::Handle::try_current()
                    .map_err(|_| DispatcherError::NoRuntime)?;
                let token = cancel.clone();
                let timer = handle.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(timeout) => {
                            warn!(timeout_secs = timeout.as_secs(), "push stage deadline reached");
                            token.cancel();
                        }
                    }
                });
                Some(timer.abort_handle())
            }
            None => None,
        };

        Ok(PushStage {
            replicator: self.replicator,
            committer: self.committer,
            downstream,
            slots: Arc::new(Semaphore::new(self.config.concurrency)),
            concurrency: self.config.concurrency,
            group: TaskGroup::new(),
            cancel,
            retry: self.config.retry,
            metrics: self.metrics.unwrap_or_default(),
            deadline,
        })
    }
}

/// Chunk push stage
pub struct PushStage<R, L, W = Unchained> {
    replicator: Arc<R>,
    committer: Arc<L>,
    downstream: Downstream<W>,
    slots: Arc<Semaphore>,
    concurrency: usize,
    group: TaskGroup,
    cancel: CancellationToken,
    retry: RetryConfig,
    metrics: Arc<DispatchMetrics>,
    deadline: Option<AbortHandle>,
}

impl<R, L> PushStage<R, L, Unchained>
where
    R: Replicator + Sync + 'static,
    L: LocalCommitter + Sync + 'static,
{
    /// Terminal stage with the default pool size
    pub fn terminal(replicator: Arc<R>, committer: Arc<L>) -> Self {
        Self::with_downstream(replicator, committer, Downstream::Terminal)
    }
}

impl<R, L, W> PushStage<R, L, W>
where
    R: Replicator + Sync + 'static,
    L: LocalCommitter + Sync + 'static,
    W: ChainWriter,
{
    /// Chained stage with the default pool size
    pub fn chained(replicator: Arc<R>, committer: Arc<L>, next: W) -> Self {
        Self::with_downstream(replicator, committer, Downstream::Chained(next))
    }

    fn with_downstream(replicator: Arc<R>, committer: Arc<L>, downstream: Downstream<W>) -> Self {
        Self {
            replicator,
            committer,
            downstream,
            slots: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
            group: TaskGroup::new(),
            cancel: CancellationToken::new(),
            retry: RetryConfig::default(),
            metrics: Arc::default(),
            deadline: None,
        }
    }

    /// Stage metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Token cancelling every task of this stage
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Size of the slot pool
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Slots not currently held by a task
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Whether this stage has no downstream
    pub fn is_terminal(&self) -> bool {
        matches!(self.downstream, Downstream::Terminal)
    }

    /// Downstream stage, if chained
    pub fn downstream(&self) -> Option<&W> {
        match &self.downstream {
            Downstream::Terminal => None,
            Downstream::Chained(next) => Some(next),
        }
    }

    /// Accept one write unit
    ///
    /// Blocks until a slot is free, launches the push task, then either
    /// forwards the unit downstream (chained) or waits for every outstanding
    /// task (terminal).
    ///
    /// # Errors
    /// - `InvalidData` if the unit is missing its address or payload
    /// - `Cancelled` if the stage was cancelled while waiting
    /// - a task failure (terminal stage only)
    /// - any downstream error
    #[instrument(name = "push_stage_write", skip(self, unit))]
    pub async fn write(&mut self, unit: WriteUnit) -> Result<(), ContractError> {
        let chunk = match unit.to_chunk() {
            Ok(chunk) => chunk,
            Err(err) => {
                self.metrics.inc_invalid_count();
                return Err(err);
            }
        };

        self.dispatch(chunk).await?;

        match &mut self.downstream {
            Downstream::Chained(next) => next.chain_write(unit).await,
            Downstream::Terminal => self.group.wait().await,
        }
    }

    /// Wait for every push task, then finalize downstream
    ///
    /// # Errors
    /// - the first task failure, in which case downstream is not finalized
    /// - `NoTerminalWriter` for a terminal stage
    /// - any downstream error
    #[instrument(name = "push_stage_finalize", skip(self))]
    pub async fn finalize(&mut self) -> Result<Digest, ContractError> {
        self.group.wait().await?;

        let snapshot = self.metrics.snapshot();
        info!(
            tasks = snapshot.tasks_started,
            attempts = snapshot.push_attempts,
            pushed = snapshot.pushed_count,
            committed = snapshot.committed_count,
            peak_in_flight = snapshot.peak_in_flight,
            "push stage drained"
        );

        match &mut self.downstream {
            Downstream::Chained(next) => next.sum().await,
            Downstream::Terminal => Err(ContractError::NoTerminalWriter),
        }
    }

    /// Acquire a slot and launch the push task for `chunk`
    async fn dispatch(&mut self, chunk: Chunk) -> Result<(), ContractError> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ContractError::Cancelled),
            permit = Arc::clone(&self.slots).acquire_owned() => permit
                .map_err(|_| ContractError::Other("push slot pool closed".to_string()))?,
        };
        let slot = Slot::new(permit, Arc::clone(&self.metrics));

        debug!(
            address = %chunk.address().short(),
            size = chunk.len(),
            available = self.slots.available_permits(),
            "push task launched"
        );

        let task = PushTask {
            replicator: Arc::clone(&self.replicator),
            committer: Arc::clone(&self.committer),
            chunk,
            cancel: self.cancel.clone(),
            retry: self.retry,
            metrics: Arc::clone(&self.metrics),
        };
        self.group.spawn(task.run(slot));
        self.group.reap();

        Ok(())
    }
}

impl<R, L, W> ChainWriter for PushStage<R, L, W>
where
    R: Replicator + Sync + 'static,
    L: LocalCommitter + Sync + 'static,
    W: ChainWriter,
{
    async fn chain_write(&mut self, unit: WriteUnit) -> Result<(), ContractError> {
        self.write(unit).await
    }

    async fn sum(&mut self) -> Result<Digest, ContractError> {
        self.finalize().await
    }
}

impl<R, L, W> Drop for PushStage<R, L, W> {
    fn drop(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }
}
