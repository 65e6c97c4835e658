//! Network control agent daemon entry point.

use anyhow::Context;
use clap::Parser;
use netagentd::{AgentConfig, GoalStateServer, TransitProtocol};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Network control agent: applies controller goal states to the local dataplane.
#[derive(Parser, Debug)]
#[command(name = "netagentd", version, about, long_about = None)]
struct Args {
    /// Transit daemon RPC endpoint
    #[arg(short = 's', long = "server", default_value = "127.0.0.1:9075")]
    server: SocketAddr,

    /// Transit RPC transport (udp or tcp)
    #[arg(short = 'p', long = "protocol", default_value = "udp")]
    protocol: TransitProtocol,

    /// Goal state listen endpoint
    #[arg(short = 'l', long = "listen", default_value = "127.0.0.1:9074")]
    listen: SocketAddr,

    /// Per-call transit RPC timeout in milliseconds
    #[arg(long = "rpc-timeout-ms", default_value = "3000")]
    rpc_timeout_ms: u64,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    info!("--- Starting netagentd ---");

    let config = AgentConfig::new()
        .with_transit_server(args.server)
        .with_protocol(args.protocol)
        .with_rpc_timeout(Duration::from_millis(args.rpc_timeout_ms))
        .with_listen(args.listen)
        .with_debug(args.debug);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    let mut server = GoalStateServer::bind(&config, cancel)
        .await
        .with_context(|| format!("failed to bind goal state listener on {}", config.listen))?;

    server.run().await.context("goal state server failed")?;

    info!("netagentd exiting");
    Ok(())
}
