use crate::{Block, Transaction};

/// Transactions admitted but not yet sealed into a block.
#[derive(Clone, Debug, Default)]
pub struct TransactionPool {
    txs: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// No uniqueness check; admission decides what gets in.
    pub fn add(&mut self, tx: Transaction) {
        self.txs.push(tx);
    }

    /// Owned copy of the current contents, detached from later admissions.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.clone()
    }

    pub fn clear(&mut self) {
        self.txs.clear();
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Drop every pooled transaction that already appears in `chain`.
    /// Returns how many were removed.
    pub fn retain_unsealed(&mut self, chain: &[Block]) -> usize {
        let before = self.txs.len();
        self.txs
            .retain(|tx| !chain.iter().any(|b| b.transactions.contains(tx)));
        before - self.txs.len()
    }
}
