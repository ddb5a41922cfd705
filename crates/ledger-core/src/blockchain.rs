//! The node aggregate: chain state behind one lock, plus peers, difficulty
//! and the network seams.

use crate::consensus::{longest_valid_chain, PeerClient, PeerDiscovery};
use crate::constants::{
    DIFFICULTY_ADJUSTMENT_SECS, MAX_DIFFICULTY, MINING_INTERVAL_SECS, MINING_REWARD,
    MIN_DIFFICULTY, NEIGHBOR_SYNC_SECS, PEER_TIMEOUT_MILLIS,
};
use crate::difficulty::DifficultyController;
use crate::signature::{is_mining_reward, TransactionRequest};
use crate::state::{calculate_total_amount, ChainState};
use crate::{Block, Transaction};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Recipient of mining rewards.
    pub address: String,
    pub initial_difficulty: u32,
    pub difficulty_bounds: RangeInclusive<u32>,
    pub mining_reward: f64,
    pub mining_interval: Duration,
    pub difficulty_interval: Duration,
    pub neighbor_sync_interval: Duration,
    /// Upper bound on a single peer chain fetch.
    pub peer_timeout: Duration,
}

impl NodeConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            initial_difficulty: MIN_DIFFICULTY,
            difficulty_bounds: MIN_DIFFICULTY..=MAX_DIFFICULTY,
            mining_reward: MINING_REWARD,
            mining_interval: Duration::from_secs(MINING_INTERVAL_SECS),
            difficulty_interval: Duration::from_secs(DIFFICULTY_ADJUSTMENT_SECS),
            neighbor_sync_interval: Duration::from_secs(NEIGHBOR_SYNC_SECS),
            peer_timeout: Duration::from_millis(PEER_TIMEOUT_MILLIS),
        }
    }
}

pub struct Blockchain {
    /// Guards every read-modify-write of chain and pool: sealing, replacing
    /// and admitting all take it for their full duration.
    state: Arc<Mutex<ChainState>>,
    /// Last committed chain, readable without waiting on a running search.
    published: watch::Sender<Arc<Vec<Block>>>,
    peers: RwLock<Vec<String>>,
    difficulty: Mutex<DifficultyController>,
    client: Arc<dyn PeerClient>,
    discovery: Arc<dyn PeerDiscovery>,
    config: NodeConfig,
}

impl Blockchain {
    pub fn new(
        config: NodeConfig,
        client: Arc<dyn PeerClient>,
        discovery: Arc<dyn PeerDiscovery>,
    ) -> Self {
        let difficulty = DifficultyController::with_bounds(
            config.initial_difficulty,
            1,
            config.difficulty_bounds.clone(),
        );
        let state = ChainState::new(config.address.clone(), difficulty.current())
            .with_reward(config.mining_reward);
        let (published, _) = watch::channel(Arc::new(state.chain().to_vec()));
        info!(address = %config.address, difficulty = difficulty.current(), "blockchain created");
        Self {
            state: Arc::new(Mutex::new(state)),
            published,
            peers: RwLock::new(Vec::new()),
            difficulty: Mutex::new(difficulty),
            client,
            discovery,
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn publish(&self, state: &ChainState) {
        self.published.send_replace(Arc::new(state.chain().to_vec()));
    }

    pub fn chain(&self) -> Arc<Vec<Block>> {
        self.published.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.published.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.borrow().is_empty()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.pool().snapshot()
    }

    pub async fn clear_transactions(&self) {
        self.state.lock().await.clear_pool();
        info!("transaction pool cleared");
    }

    /// Balance over the published chain; never waits on a running search.
    pub fn amount(&self, address: &str) -> f64 {
        calculate_total_amount(&self.chain(), address)
    }

    pub async fn difficulty(&self) -> u32 {
        self.difficulty.lock().await.current()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.clone()
    }

    pub async fn set_peers(&self, peers: Vec<String>) {
        *self.peers.write().await = peers;
    }

    /// Admit a transaction relayed by a peer. No rebroadcast.
    pub async fn receive_transaction(&self, request: &TransactionRequest) -> bool {
        if !request.validate() {
            warn!("transaction request is incomplete");
            return false;
        }
        let (tx, public_key, signature) = match request.into_parts() {
            Ok(parts) => parts,
            Err(err) => {
                warn!(error = %err, "transaction request rejected");
                return false;
            }
        };
        // Rewards are only ever minted locally.
        if is_mining_reward(&tx) {
            warn!("inbound transaction claims the mining sender");
            return false;
        }
        self.state
            .lock()
            .await
            .add_transaction(tx, Some(&public_key), Some(&signature))
    }

    /// Admit a client transaction and relay it to every peer.
    pub async fn submit_transaction(&self, request: &TransactionRequest) -> bool {
        if !self.receive_transaction(request).await {
            return false;
        }
        for peer in self.peers().await {
            if let Err(err) = self.client.submit_transaction(&peer, request).await {
                warn!(%peer, error = %err, "transaction relay failed");
            }
        }
        true
    }

    /// One mining cycle. Holds the state lock from pool snapshot to seal; the
    /// search itself runs on the blocking pool with the difficulty current at
    /// its start. Peers are notified after the lock is released.
    pub async fn mine(&self) -> Option<Block> {
        let mut state = Arc::clone(&self.state).lock_owned().await;
        let difficulty = self.difficulty.lock().await.current();

        let handle = tokio::task::spawn_blocking(move || {
            let sealed = state.mine(difficulty);
            (sealed, state)
        });
        let (sealed, state) = match handle.await {
            Ok(out) => out,
            Err(err) => {
                error!(error = %err, "mining task failed");
                return None;
            }
        };
        let block = sealed?;
        self.publish(&state);
        drop(state);

        info!(index = block.index, difficulty, "action=mining, status=success");
        for peer in self.peers().await {
            if let Err(err) = self.client.clear_pool(&peer).await {
                warn!(%peer, error = %err, "pool clear request failed");
            }
            if let Err(err) = self.client.request_consensus(&peer).await {
                warn!(%peer, error = %err, "consensus request failed");
            }
        }
        Some(block)
    }

    /// Replace the local chain with the longest valid peer chain, if one is
    /// longer. The state lock is held across the whole scan.
    pub async fn resolve_conflicts(&self) -> bool {
        let mut state = self.state.lock().await;
        let peers = self.peers().await;
        let best = longest_valid_chain(
            state.len(),
            &peers,
            self.client.as_ref(),
            self.config.peer_timeout,
        )
        .await;
        match best {
            Some(chain) => {
                state.replace_chain(chain);
                self.publish(&state);
                info!("resolve conflicts replaced");
                true
            }
            None => {
                info!("resolve conflicts not replaced");
                false
            }
        }
    }

    pub async fn sync_neighbors(&self) {
        let peers = self.discovery.discover().await;
        info!(?peers, "neighbors synced");
        self.set_peers(peers).await;
    }

    pub async fn sync_difficulty(&self) -> u32 {
        let len = self.len();
        self.difficulty.lock().await.adjust(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::StaticPeers;
    use crate::error::Result;
    use async_trait::async_trait;
    use k256::ecdsa::SigningKey;

    struct Offline;

    #[async_trait]
    impl PeerClient for Offline {
        async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
            Err(crate::LedgerError::PeerTimeout(peer.to_string()))
        }
        async fn submit_transaction(&self, _: &str, _: &TransactionRequest) -> Result<()> {
            Ok(())
        }
        async fn clear_pool(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn request_consensus(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn node() -> Blockchain {
        let mut config = NodeConfig::new("miner");
        config.initial_difficulty = 1;
        config.difficulty_bounds = 1..=2;
        Blockchain::new(config, Arc::new(Offline), Arc::new(StaticPeers::default()))
    }

    #[tokio::test]
    async fn mine_publishes_sealed_block() {
        let chain = node();
        let sk = SigningKey::random(&mut rand::thread_rng());
        let request = TransactionRequest::signed(&sk, "bob", 1.5).unwrap();
        assert!(chain.submit_transaction(&request).await);

        let block = chain.mine().await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.chain().last(), Some(&block));
        assert!(chain.transactions().await.is_empty());
        assert_eq!(chain.amount("bob"), 1.5);
    }

    #[tokio::test]
    async fn amount_reads_published_chain_while_state_is_locked() {
        let chain = node();
        let sk = SigningKey::random(&mut rand::thread_rng());
        let request = TransactionRequest::signed(&sk, "bob", 2.5).unwrap();
        assert!(chain.submit_transaction(&request).await);
        chain.mine().await.unwrap();

        let _held = chain.state.lock().await;
        assert_eq!(chain.amount("bob"), 2.5);
        assert_eq!(chain.amount("miner"), MINING_REWARD);
    }

    #[tokio::test]
    async fn mine_with_empty_pool_is_noop() {
        let chain = node();
        assert!(chain.mine().await.is_none());
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn incomplete_request_is_rejected() {
        let chain = node();
        let sk = SigningKey::random(&mut rand::thread_rng());
        let mut request = TransactionRequest::signed(&sk, "bob", 1.5).unwrap();
        request.sender_public_key = None;
        assert!(!chain.submit_transaction(&request).await);
        assert!(chain.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn inbound_mining_sender_is_rejected() {
        let chain = node();
        let sk = SigningKey::random(&mut rand::thread_rng());
        let mut request = TransactionRequest::signed(&sk, "bob", 1.5).unwrap();
        request.sender_blockchain_address = Some(crate::constants::MINING_SENDER.into());
        assert!(!chain.receive_transaction(&request).await);
    }

    #[tokio::test]
    async fn unreachable_peers_leave_chain_alone() {
        let chain = node();
        chain.set_peers(vec!["127.0.0.1:1".into()]).await;
        assert!(!chain.resolve_conflicts().await);
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn difficulty_follows_growth() {
        let chain = node();
        assert_eq!(chain.sync_difficulty().await, 1);
        for v in [1.0, 2.0] {
            let sk = SigningKey::random(&mut rand::thread_rng());
            let request = TransactionRequest::signed(&sk, "bob", v).unwrap();
            chain.submit_transaction(&request).await;
            chain.mine().await.unwrap();
        }
        assert_eq!(chain.sync_difficulty().await, 2);
    }

    #[tokio::test]
    async fn sync_neighbors_replaces_peer_set() {
        let config = NodeConfig::new("miner");
        let discovery = StaticPeers(vec!["127.0.0.1:5001".into(), "127.0.0.1:5002".into()]);
        let chain = Blockchain::new(config, Arc::new(Offline), Arc::new(discovery));
        chain.set_peers(vec!["stale:1".into()]).await;
        chain.sync_neighbors().await;
        assert_eq!(chain.peers().await.len(), 2);
    }
}
