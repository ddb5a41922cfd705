use crate::constants::{MINING_REWARD, MINING_SENDER};
use crate::pool::TransactionPool;
use crate::pow::proof_of_work;
use crate::signature::{is_mining_reward, verify_transaction};
use crate::{Block, Transaction};
use k256::ecdsa::{Signature, VerifyingKey};
use tracing::{info, warn};

/// Chain and pool of one node. Everything that reads-then-writes either of
/// them goes through a single `&mut ChainState`, so callers hold one lock
/// around it to get atomic seal, replace and admit.
#[derive(Debug)]
pub struct ChainState {
    chain: Vec<Block>,
    pool: TransactionPool,
    address: String,
    reward: f64,
}

impl ChainState {
    pub fn new(address: impl Into<String>, difficulty: u32) -> Self {
        Self {
            chain: vec![Block::genesis(difficulty)],
            pool: TransactionPool::new(),
            address: address.into(),
            reward: MINING_REWARD,
        }
    }

    pub fn with_reward(mut self, reward: f64) -> Self {
        self.reward = reward;
        self
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds at least the genesis block")
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn clear_pool(&mut self) {
        self.pool.clear();
    }

    /// Admit `tx` into the pool. Mining rewards skip the signature check;
    /// everything else needs a key and signature that verify.
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        public_key: Option<&VerifyingKey>,
        signature: Option<&Signature>,
    ) -> bool {
        if is_mining_reward(&tx) {
            self.pool.add(tx);
            return true;
        }
        match (public_key, signature) {
            (Some(pk), Some(sig)) if verify_transaction(pk, sig, &tx) => {
                self.pool.add(tx);
                true
            }
            _ => {
                warn!(sender = %tx.sender, "transaction signature rejected");
                false
            }
        }
    }

    /// Mine the pool into a new block. Returns `None` without touching
    /// anything when the pool is empty.
    ///
    /// CPU bound and unbounded; run it off the async executor.
    pub fn mine(&mut self, difficulty: u32) -> Option<Block> {
        if self.pool.is_empty() {
            return None;
        }
        self.pool.add(Transaction::new(
            MINING_SENDER,
            self.address.clone(),
            self.reward,
        ));
        let transactions = self.pool.snapshot();
        let previous_hash = self.last_block().current_hash;
        let nonce = proof_of_work(&previous_hash, &transactions, difficulty);
        Some(self.seal_block(nonce, transactions, difficulty))
    }

    fn seal_block(&mut self, nonce: u64, transactions: Vec<Transaction>, difficulty: u32) -> Block {
        let last = self.last_block();
        let block = Block::new(
            last.index + 1,
            nonce,
            last.current_hash,
            transactions,
            difficulty,
        );
        self.chain.push(block.clone());
        self.pool.clear();
        info!(
            index = block.index,
            nonce,
            hash = %hex::encode(block.current_hash),
            txs = block.transactions.len(),
            "block sealed"
        );
        block
    }

    /// Swap in an adopted chain wholesale. Pool entries it already seals are
    /// dropped. An empty replacement is ignored.
    pub fn replace_chain(&mut self, chain: Vec<Block>) {
        if chain.is_empty() {
            warn!("refusing to replace chain with an empty one");
            return;
        }
        let dropped = self.pool.retain_unsealed(&chain);
        info!(len = chain.len(), dropped, "chain replaced");
        self.chain = chain;
    }

}

/// Credits minus debits for `address` across every block of `chain`.
pub fn calculate_total_amount(chain: &[Block], address: &str) -> f64 {
    let mut total = 0.0;
    for tx in chain.iter().flat_map(|b| b.transactions.iter()) {
        if tx.recipient == address {
            total += tx.value;
        }
        if tx.sender == address {
            total -= tx.value;
        }
    }
    total
}
