//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use dispatcher::SimulatedNetwork;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    push: PushInfo,
    network: NetworkInfo,
    chunk_size: usize,
}

#[derive(Serialize)]
struct PushInfo {
    concurrency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

#[derive(Serialize)]
struct NetworkInfo {
    seed: u64,
    failure_rate: f64,
    latency_ms: u64,
    local_address: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    peers: Vec<String>,
    peer_count: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let network = SimulatedNetwork::from_config(&blueprint.network);
    let peers = if args.peers {
        network.peers().iter().map(ToString::to_string).collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        push: PushInfo {
            concurrency: blueprint.push.concurrency,
            timeout_secs: blueprint.push.timeout_secs,
            initial_backoff_ms: blueprint.push.retry.initial_backoff_ms,
            max_backoff_ms: blueprint.push.retry.max_backoff_ms,
        },
        network: NetworkInfo {
            seed: blueprint.network.seed,
            failure_rate: blueprint.network.failure_rate,
            latency_ms: blueprint.network.latency_ms,
            local_address: network.local_address().to_string(),
            peers,
            peer_count: network.peers().len(),
        },
        chunk_size: blueprint.chunking.chunk_size,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Chunk Push Configuration ({}) ===\n", info.version);

    println!("Push");
    println!("   ├─ Concurrency: {}", info.push.concurrency);
    match info.push.timeout_secs {
        Some(secs) => println!("   ├─ Deadline: {}s", secs),
        None => println!("   ├─ Deadline: none"),
    }
    if info.push.initial_backoff_ms == 0 {
        println!("   └─ Retry: immediate");
    } else {
        println!(
            "   └─ Retry: {}ms doubling up to {}ms",
            info.push.initial_backoff_ms,
            info.push.max_backoff_ms.max(info.push.initial_backoff_ms)
        );
    }

    println!("\nNetwork");
    println!("   ├─ Seed: {}", info.network.seed);
    println!("   ├─ Failure rate: {:.2}", info.network.failure_rate);
    println!("   ├─ Latency: {}ms", info.network.latency_ms);
    println!("   ├─ Local overlay: {}", info.network.local_address);
    println!("   └─ Peers ({})", info.network.peer_count);
    for (i, peer) in info.network.peers.iter().enumerate() {
        let prefix = if i + 1 == info.network.peers.len() { "└─" } else { "├─" };
        println!("        {} {}", prefix, peer);
    }

    println!("\nChunking");
    println!("   └─ Chunk size: {} bytes", info.chunk_size);

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_listed_on_request() {
        let mut blueprint = PipelineBlueprint::default();
        blueprint.network.peers = 3;

        let args = InfoArgs {
            config: "config.toml".into(),
            json: true,
            peers: true,
        };
        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.network.peers.len(), 3);
        assert_eq!(info.network.peer_count, 3);

        let args = InfoArgs { peers: false, ..args };
        let info = build_config_info(&blueprint, &args);
        assert!(info.network.peers.is_empty());
        assert_eq!(info.network.local_address.len(), 64);
    }
}
