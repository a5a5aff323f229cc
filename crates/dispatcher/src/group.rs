//! TaskGroup - join state over every push task of one stage
//!
//! Tracks the first terminal failure and lets the stage block until all
//! launched tasks have finished. The failure is sticky: once recorded it is
//! reported by every later `wait`.

use std::future::Future;

use contracts::ContractError;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Group of spawned tasks with first-error tracking
///
/// Dropping the group aborts any task still running.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: JoinSet<Result<(), ContractError>>,
    first_error: Option<ContractError>,
    completed: u64,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task on the current runtime
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), ContractError>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Tasks spawned but not yet reaped
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks reaped so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// First terminal failure seen so far, if any
    pub fn failure(&self) -> Option<&ContractError> {
        self.first_error.as_ref()
    }

    /// Collect already-finished tasks without blocking
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.record(result);
        }
    }

    /// Wait for every outstanding task to finish
    ///
    /// # Errors
    /// The first failure any task of this group has ever reported
    pub async fn wait(&mut self) -> Result<(), ContractError> {
        while let Some(result) = self.tasks.join_next().await {
            self.record(result);
        }
        debug!(completed = self.completed, "task group drained");

        match &self.first_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn record(&mut self, result: Result<Result<(), ContractError>, JoinError>) {
        self.completed += 1;

        let err = match result {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(join_err) if join_err.is_panic() => {
                warn!(error = %join_err, "push task panicked");
                ContractError::TaskPanicked {
                    message: join_err.to_string(),
                }
            }
            Err(_) => ContractError::Cancelled,
        };

        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}
