use crate::blockchain::Blockchain;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Recurring mining, difficulty and neighbour loops for one node, with a
/// shared stop signal.
pub struct Scheduler {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(chain: Arc<Blockchain>) -> Self {
        let (stop, stopped) = watch::channel(false);
        let config = chain.config().clone();

        let handles = vec![
            spawn_loop("mining", config.mining_interval, stopped.clone(), {
                let chain = chain.clone();
                move || {
                    let chain = chain.clone();
                    async move {
                        chain.mine().await;
                    }
                }
            }),
            spawn_loop("difficulty", config.difficulty_interval, stopped.clone(), {
                let chain = chain.clone();
                move || {
                    let chain = chain.clone();
                    async move {
                        chain.sync_difficulty().await;
                    }
                }
            }),
            spawn_loop("neighbors", config.neighbor_sync_interval, stopped, {
                let chain = chain.clone();
                move || {
                    let chain = chain.clone();
                    async move {
                        chain.sync_neighbors().await;
                    }
                }
            }),
        ];
        Self { stop, handles }
    }

    /// Receiver that flips to `true` once [`Scheduler::shutdown`] is called.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Signal every loop to stop and wait for them. A cycle already running
    /// finishes first.
    pub async fn shutdown(self) {
        self.stop.send_replace(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "background task ended abnormally");
            }
        }
    }
}

/// Startup sequence: learn the neighbours, then catch up with them.
pub async fn run_startup(chain: &Blockchain) {
    chain.sync_neighbors().await;
    chain.resolve_conflicts().await;
}

/// Run `job` every `period` (first run immediately). Cycles never overlap;
/// ticks missed while a cycle runs are skipped.
fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stopped: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while !*stopped.borrow() {
            tokio::select! {
                _ = ticker.tick() => job().await,
                changed = stopped.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(task = name, "background task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::NodeConfig;
    use crate::consensus::{PeerClient, StaticPeers};
    use crate::error::Result;
    use crate::signature::TransactionRequest;
    use crate::Block;
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

    fn fast_config() -> NodeConfig {
        let mut config = NodeConfig::new("miner");
        config.initial_difficulty = 1;
        config.difficulty_bounds = 1..=1;
        config.mining_interval = Duration::from_millis(20);
        config.difficulty_interval = Duration::from_millis(20);
        config.neighbor_sync_interval = Duration::from_millis(20);
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn loops_mine_pending_transactions_and_stop() {
        let discovery = StaticPeers(vec!["127.0.0.1:5001".into()]);
        let chain = Arc::new(Blockchain::new(
            fast_config(),
            Arc::new(Offline),
            Arc::new(discovery),
        ));
        let sk = SigningKey::random(&mut rand::thread_rng());
        let request = TransactionRequest::signed(&sk, "bob", 1.0).unwrap();
        assert!(chain.submit_transaction(&request).await);

        let scheduler = Scheduler::start(chain.clone());
        let mut stop = scheduler.stop_signal();
        for _ in 0..200 {
            if chain.len() > 1 && !chain.peers().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.peers().await, vec!["127.0.0.1:5001".to_string()]);

        scheduler.shutdown().await;
        assert!(*stop.borrow_and_update());
    }

    #[tokio::test]
    async fn startup_syncs_then_resolves() {
        let discovery = StaticPeers(vec!["127.0.0.1:1".into()]);
        let chain = Blockchain::new(fast_config(), Arc::new(Offline), Arc::new(discovery));
        run_startup(&chain).await;
        assert_eq!(chain.peers().await.len(), 1);
        assert_eq!(chain.len(), 1);
    }
}
