//! Longest-valid-chain agreement with peers, and the seams to the network.

use crate::error::{LedgerError, Result};
use crate::signature::TransactionRequest;
use crate::validate::valid_chain;
use crate::Block;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outbound calls to other nodes. Peers are addressed as `host:port`.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// The peer's full chain. Transport and decode failures are errors.
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>>;

    /// Relay an admitted transaction.
    async fn submit_transaction(&self, peer: &str, request: &TransactionRequest) -> Result<()>;

    /// Ask the peer to drop its pool after we sealed a block.
    async fn clear_pool(&self, peer: &str) -> Result<()>;

    /// Prompt the peer to run conflict resolution.
    async fn request_consensus(&self, peer: &str) -> Result<()>;
}

/// Source of the current neighbour set.
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    async fn discover(&self) -> Vec<String>;
}

/// Fixed peer list.
#[derive(Clone, Debug, Default)]
pub struct StaticPeers(pub Vec<String>);

#[async_trait]
impl PeerDiscovery for StaticPeers {
    async fn discover(&self) -> Vec<String> {
        self.0.clone()
    }
}

async fn fetch_with_timeout(
    client: &dyn PeerClient,
    peer: &str,
    timeout: Duration,
) -> Result<Vec<Block>> {
    tokio::time::timeout(timeout, client.fetch_chain(peer))
        .await
        .map_err(|_| LedgerError::PeerTimeout(peer.to_string()))?
}

/// Scan `peers` in order and return the longest chain that is strictly longer
/// than `local_len` and passes validation. Unreachable or malformed peers
/// are skipped. On equal length the first candidate seen wins.
pub async fn longest_valid_chain(
    local_len: usize,
    peers: &[String],
    client: &dyn PeerClient,
    timeout: Duration,
) -> Option<Vec<Block>> {
    let mut best_len = local_len;
    let mut best: Option<Vec<Block>> = None;

    for peer in peers {
        let chain = match fetch_with_timeout(client, peer, timeout).await {
            Ok(chain) => chain,
            Err(err) => {
                warn!(%peer, error = %err, "skipping peer");
                continue;
            }
        };
        debug!(%peer, len = chain.len(), "fetched peer chain");
        if chain.len() > best_len && valid_chain(&chain) {
            best_len = chain.len();
            best = Some(chain);
        }
    }

    match &best {
        Some(chain) => info!(len = chain.len(), "found longer valid chain"),
        None => info!("no longer valid chain among peers"),
    }
    best
}
