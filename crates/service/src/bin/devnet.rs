//! Crosslink devnet harness.
//!
//! Runs the aggregation service over an in-memory subnet of locally generated
//! signing validators. Useful for exercising the HTTP API end to end without
//! a real p2p transport.
//!
//! # Usage
//!
//! ```bash
//! # Five local validators on the default port
//! crosslink-devnet
//!
//! # Larger subnet, custom config
//! crosslink-devnet --config service.toml --validators 9
//! ```
//!
//! The startup log prints the devnet chain and subnet ids plus a ready-made
//! example request.

use anyhow::{Context, Result};
use clap::Parser;
use crosslink_aggregator::SignatureAggregator;
use crosslink_network_memory::{MemoryNetwork, SignerBehavior};
use crosslink_service::{create_router, ServiceConfig, ServiceState};
use crosslink_types::{
    bls_keypair_from_seed, ChainId, NodeId, SubnetId, UnsignedMessage, Validator,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Crosslink devnet: the aggregation service over in-memory validators.
#[derive(Parser, Debug)]
#[command(name = "crosslink-devnet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API listen address (overrides config)
    #[arg(long)]
    api_addr: Option<SocketAddr>,

    /// Number of local signing validators
    #[arg(long, default_value_t = 5)]
    validators: usize,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Devnet chain and subnet ids are fixed so example requests stay stable.
const DEVNET_CHAIN: ChainId = ChainId::from_bytes([1u8; 32]);
const DEVNET_SUBNET: SubnetId = SubnetId::from_bytes([2u8; 32]);
const DEVNET_NETWORK_ID: u32 = 1337;

/// Build the in-memory subnet: `count` weight-1 validators, one node each,
/// all connected and answering with valid signatures.
fn build_devnet_network(count: usize) -> Arc<MemoryNetwork> {
    let network = Arc::new(MemoryNetwork::new());
    network.register_chain(DEVNET_CHAIN, DEVNET_SUBNET);

    let mut validators = Vec::with_capacity(count);
    for i in 0..count {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
        let keypair = bls_keypair_from_seed(&seed);

        let mut node_bytes = [0u8; 20];
        node_bytes[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
        let node = NodeId::from_bytes(node_bytes);

        validators.push(Validator::new(keypair.public_key(), 1, vec![node]));
        network.connect(node);
        network.set_behavior(node, SignerBehavior::Sign(keypair));
    }
    network.set_validators(DEVNET_SUBNET, validators);
    network
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(api_addr) = cli.api_addr {
        config.api_addr = api_addr;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    if config.metrics_enabled {
        crosslink_metrics_prometheus::install();
    }

    info!(validators = cli.validators, "building devnet subnet");
    let network = build_devnet_network(cli.validators);

    let aggregator = Arc::new(SignatureAggregator::new(
        Arc::clone(&network),
        config.aggregator_config(),
    ));
    let state = ServiceState {
        aggregator,
        quorum_percentage: config.quorum_percentage,
    };

    let example = UnsignedMessage::new(DEVNET_NETWORK_ID, DEVNET_CHAIN, b"hello".to_vec());
    info!(
        chain = %DEVNET_CHAIN,
        subnet = %DEVNET_SUBNET,
        quorum = config.quorum_percentage,
        "devnet ready; example: curl -X POST http://{}/aggregate-signatures \
         -H 'Content-Type: application/json' \
         -d '{{\"message\": \"{}\", \"signing-subnet-id\": \"{}\"}}'",
        config.api_addr,
        hex::encode(example.bytes()),
        DEVNET_SUBNET,
    );

    let listener = tokio::net::TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.api_addr))?;
    info!(addr = %config.api_addr, "listening");

    axum::serve(listener, create_router(state, config.metrics_enabled))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
