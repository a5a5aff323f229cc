//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after applying CLI overrides")?;

    info!(
        concurrency = blueprint.push.concurrency,
        timeout_secs = ?blueprint.push.timeout_secs,
        peers = blueprint.network.peers,
        failure_rate = blueprint.network.failure_rate,
        chunk_size = blueprint.chunking.chunk_size,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        input: args.input.clone(),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    let signal_task = tokio::spawn(cancel_on_signal(pipeline.cancellation_token()));

    info!("Starting pipeline...");
    let result = pipeline.run().await;
    signal_task.abort();

    let stats = result?;
    if args.json {
        let json = serde_json::to_string_pretty(&stats.report())
            .context("Failed to serialize run statistics")?;
        println!("{}", json);
    } else {
        stats.print_summary();
    }

    if stats.digest.is_none() {
        anyhow::bail!("Pipeline cancelled before completion");
    }

    info!("chunk-push finished");
    Ok(())
}

/// Apply CLI overrides on top of the loaded configuration
fn apply_overrides(blueprint: &mut PipelineBlueprint, args: &RunArgs) {
    if let Some(concurrency) = args.concurrency {
        info!(concurrency, "Overriding push concurrency from CLI");
        blueprint.push.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        info!(timeout, "Overriding pipeline deadline from CLI");
        blueprint.push.timeout_secs = if timeout == 0 { None } else { Some(timeout) };
    }
    if let Some(failure_rate) = args.failure_rate {
        info!(failure_rate, "Overriding network failure rate from CLI");
        blueprint.network.failure_rate = failure_rate;
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, cancelling pipeline...");
    token.cancel();
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Push:");
    println!("  Concurrency: {}", blueprint.push.concurrency);
    match blueprint.push.timeout_secs {
        Some(secs) => println!("  Deadline: {}s", secs),
        None => println!("  Deadline: none"),
    }
    println!(
        "  Retry backoff: {}ms..{}ms",
        blueprint.push.retry.initial_backoff_ms, blueprint.push.retry.max_backoff_ms
    );
    println!("\nNetwork:");
    println!("  Peers: {}", blueprint.network.peers);
    println!("  Seed: {}", blueprint.network.seed);
    println!("  Failure rate: {:.2}", blueprint.network.failure_rate);
    println!("  Latency: {}ms", blueprint.network.latency_ms);
    println!("\nChunking:");
    println!("  Chunk size: {} bytes", blueprint.chunking.chunk_size);
    println!();
}
