use async_trait::async_trait;
use ledger_core::error::Result;
use ledger_core::{Block, ChainResponse, LedgerError, PeerClient, TransactionRequest};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// Talks to other nodes over their HTTP routes.
#[derive(Clone)]
pub struct HttpPeerClient {
    http: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

fn peer_error(peer: &str, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Peer {
        peer: peer.to_string(),
        reason: err.to_string(),
    }
}

fn check_status(peer: &str, res: Response) -> Result<Response> {
    if res.status().is_success() {
        Ok(res)
    } else {
        Err(peer_error(peer, format!("status {}", res.status())))
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>> {
        let res = self
            .http
            .get(format!("http://{peer}/chain"))
            .send()
            .await
            .map_err(|e| peer_error(peer, e))?;
        let body = check_status(peer, res)?
            .bytes()
            .await
            .map_err(|e| peer_error(peer, e))?;
        let chain = ChainResponse::decode(&body)?.chain;
        debug!(%peer, len = chain.len(), "chain fetched");
        Ok(chain)
    }

    async fn submit_transaction(&self, peer: &str, request: &TransactionRequest) -> Result<()> {
        let res = self
            .http
            .put(format!("http://{peer}/transactions"))
            .json(request)
            .send()
            .await
            .map_err(|e| peer_error(peer, e))?;
        check_status(peer, res)?;
        Ok(())
    }

    async fn clear_pool(&self, peer: &str) -> Result<()> {
        let res = self
            .http
            .delete(format!("http://{peer}/transactions"))
            .send()
            .await
            .map_err(|e| peer_error(peer, e))?;
        check_status(peer, res)?;
        Ok(())
    }

    async fn request_consensus(&self, peer: &str) -> Result<()> {
        let res = self
            .http
            .put(format!("http://{peer}/consensus"))
            .send()
            .await
            .map_err(|e| peer_error(peer, e))?;
        check_status(peer, res)?;
        Ok(())
    }
}
