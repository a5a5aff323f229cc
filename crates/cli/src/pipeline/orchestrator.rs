//! Pipeline orchestrator - wires the push stages together.
//!
//! Layout:
//! `PushStage -> LogWriter -> ManifestWriter -> PushStage (terminal)`
//!
//! The first stage replicates every input chunk. The manifest of all chunk
//! addresses is pushed by the terminal stage, and its address is the digest
//! of the run. Both stages share one cancellation token.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{Chunk, ContractError, Digest, PipelineBlueprint, PushConfig};
use dispatcher::{
    LogWriter, ManifestWriter, MemoryStore, PushStage, PushStageBuilder, SimulatedNetwork,
    Unchained,
};
use observability::RunningStats;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{split_into_chunks, PipelineStats};

type ManifestStage = PushStage<SimulatedNetwork, MemoryStore, Unchained>;
type ChunkStage = PushStage<SimulatedNetwork, MemoryStore, LogWriter<ManifestWriter<ManifestStage>>>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated blueprint, CLI overrides applied
    pub blueprint: PipelineBlueprint,

    /// File to push
    pub input: PathBuf,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelling the whole run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline to completion
    ///
    /// A cancelled run is not an error: the returned stats carry no digest.
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let data = tokio::fs::read(&self.config.input)
            .await
            .with_context(|| format!("Failed to read input {}", self.config.input.display()))?;
        let data = Bytes::from(data);
        let chunks = split_into_chunks(data.clone(), blueprint.chunking.chunk_size);

        info!(
            input = %self.config.input.display(),
            bytes = data.len(),
            chunks = chunks.len(),
            chunk_size = blueprint.chunking.chunk_size,
            "Input chunked"
        );

        let network = Arc::new(SimulatedNetwork::from_config(&blueprint.network));
        let store = Arc::new(MemoryStore::new());

        info!(
            local = %network.local_address().short(),
            peers = network.peers().len(),
            failure_rate = blueprint.network.failure_rate,
            "Simulated network ready"
        );

        let mut stage = self.build_stages(&network, &store)?;

        let mut stats = PipelineStats {
            chunks: chunks.len() as u64,
            bytes: data.len() as u64,
            ..Default::default()
        };

        let outcome = push_all(&mut stage, chunks, &mut stats.write_latency).await;

        stats.push = stage.metrics().snapshot();
        if let Some(manifest_stage) = stage.downstream().and_then(|log| log.inner().inner()) {
            stats.manifest = manifest_stage.metrics().snapshot();
        }
        stats.delivered = network.total_delivered();
        stats.stored_locally = store.len();
        stats.duration = start_time.elapsed();

        match outcome {
            Ok(digest) => {
                info!(
                    digest = %digest,
                    duration_secs = stats.duration.as_secs_f64(),
                    "Pipeline finished"
                );
                stats.digest = Some(digest);
            }
            Err(e) if e.is_cancelled() => {
                warn!(
                    pushed = stats.push.pushed_count,
                    committed = stats.push.committed_count,
                    "Pipeline cancelled before completion"
                );
            }
            Err(e) => return Err(e).context("Pipeline execution failed"),
        }

        Ok(stats)
    }

    fn build_stages(
        &self,
        network: &Arc<SimulatedNetwork>,
        store: &Arc<MemoryStore>,
    ) -> Result<ChunkStage> {
        let push = &self.config.blueprint.push;

        // Deadline is enforced by the head stage; the token reaches both.
        let manifest_config = PushConfig {
            timeout_secs: None,
            ..push.clone()
        };
        let manifest_stage = PushStageBuilder::new(Arc::clone(network), Arc::clone(store))
            .config(manifest_config)
            .cancellation(self.cancel.clone())
            .terminal()
            .context("Failed to build manifest stage")?;

        let writer = LogWriter::new("chunks", ManifestWriter::new(manifest_stage));

        let stage = PushStageBuilder::new(Arc::clone(network), Arc::clone(store))
            .config(push.clone())
            .cancellation(self.cancel.clone())
            .chained(writer)
            .context("Failed to build push stage")?;

        info!(
            concurrency = stage.concurrency(),
            timeout_secs = ?push.timeout_secs,
            "Push stages configured"
        );

        Ok(stage)
    }
}

async fn push_all(
    stage: &mut ChunkStage,
    chunks: Vec<Chunk>,
    write_latency: &mut RunningStats,
) -> Result<Digest, ContractError> {
    for chunk in chunks {
        let started = Instant::now();
        stage.write(chunk.into()).await?;
        write_latency.push(started.elapsed().as_secs_f64() * 1000.0);
    }
    stage.finalize().await
}
