//! Dispatcher error types

use thiserror::Error;

/// Push stage construction errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Slot pool must hold at least one slot
    #[error("invalid concurrency {0}: must be at least 1")]
    InvalidConcurrency(usize),

    /// A deadline was configured outside of a tokio runtime
    #[error("a push stage deadline requires a running tokio runtime")]
    NoRuntime,
}
