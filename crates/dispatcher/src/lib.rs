//! # Dispatcher
//!
//! Chunk push stage of the write pipeline.
//!
//! Responsibilities:
//! - Bound the number of concurrent chunk replications
//! - Retry every push until it succeeds or the pipeline is cancelled
//! - Commit locally when this node is the chunk's closest peer
//! - Hold back the final digest until every replication has completed

pub mod backends;
pub mod error;
pub mod group;
pub mod metrics;
pub mod stage;
mod task;

pub use backends::{LogWriter, ManifestWriter, MemoryStore, SimulatedNetwork};
pub use contracts::{ChainWriter, LocalCommitter, Replicator};
pub use error::DispatcherError;
pub use group::TaskGroup;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use stage::{Downstream, PushStage, PushStageBuilder, Unchained};
