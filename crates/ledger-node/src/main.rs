mod constants;
mod discovery;
mod peer_client;
mod routes;

use clap::Parser;
use constants::{
    DEFAULT_PORT, NEIGHBOR_IP_RANGE_END, NEIGHBOR_IP_RANGE_START, PEER_PORT_RANGE_END,
    PEER_PORT_RANGE_START, PROBE_TIMEOUT_MILLIS,
};
use discovery::PortRangeDiscovery;
use k256::ecdsa::SigningKey;
use ledger_core::consensus::StaticPeers;
use ledger_core::constants::MIN_DIFFICULTY;
use ledger_core::scheduler::{run_startup, Scheduler};
use ledger_core::signature::address_from_public_key;
use ledger_core::{Blockchain, NodeConfig, PeerDiscovery};
use peer_client::HttpPeerClient;
use routes::{router, AppState};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Host address to listen on; also the base for neighbour scanning
    #[arg(long, default_value = "127.0.0.1")]
    host: Ipv4Addr,

    /// TCP port for this node
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address credited with mining rewards. A fresh one is generated if omitted
    #[arg(long)]
    miner_address: Option<String>,

    /// Starting difficulty (leading zero hex digits)
    #[arg(long, default_value_t = MIN_DIFFICULTY)]
    difficulty: u32,

    /// Fixed peer list (host:port, comma separated). Disables port scanning
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,

    /// First port probed during neighbour discovery
    #[arg(long, default_value_t = PEER_PORT_RANGE_START)]
    peer_port_start: u16,

    /// Last port probed during neighbour discovery
    #[arg(long, default_value_t = PEER_PORT_RANGE_END)]
    peer_port_end: u16,
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let address = match args.miner_address {
        Some(address) => address,
        None => {
            let key = SigningKey::random(&mut rand::thread_rng());
            address_from_public_key(key.verifying_key())
        }
    };
    info!(%address, "mining rewards go to");

    let mut config = NodeConfig::new(address);
    config.initial_difficulty = args.difficulty;

    let client = HttpPeerClient::new(config.peer_timeout)?;
    let discovery: Arc<dyn PeerDiscovery> = if args.peers.is_empty() {
        Arc::new(PortRangeDiscovery::new(
            args.host,
            args.port,
            NEIGHBOR_IP_RANGE_START..=NEIGHBOR_IP_RANGE_END,
            args.peer_port_start..=args.peer_port_end,
            Duration::from_millis(PROBE_TIMEOUT_MILLIS),
        ))
    } else {
        Arc::new(StaticPeers(args.peers))
    };

    let chain = Arc::new(Blockchain::new(config, Arc::new(client), discovery));
    run_startup(&chain).await;
    let scheduler = Scheduler::start(chain.clone());

    let app = router(AppState {
        chain: chain.clone(),
    });
    let addr = SocketAddr::from((args.host, args.port));
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}
