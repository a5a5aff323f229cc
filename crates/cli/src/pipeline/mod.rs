//! Pipeline orchestration module.

mod chunker;
mod orchestrator;
mod stats;

pub use chunker::split_into_chunks;
pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
