use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod blockchain;
pub mod consensus;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod pool;
pub mod pow;
pub mod scheduler;
pub mod signature;
pub mod state;
pub mod validate;

pub use blockchain::{Blockchain, NodeConfig};
pub use consensus::{PeerClient, PeerDiscovery};
pub use error::LedgerError;
pub use signature::TransactionRequest;
pub use state::ChainState;

use constants::HASH_SIZE;

pub type Hash = [u8; HASH_SIZE];

pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Parse a 64-character hex string into a hash.
pub fn hash_from_hex(s: &str) -> Result<Hash, LedgerError> {
    let bytes = hex::decode(s)?;
    Hash::try_from(bytes.as_slice()).map_err(|_| LedgerError::Length {
        expected: HASH_SIZE,
        actual: bytes.len(),
    })
}

/// Serde codec for `Hash` fields: lowercase hex on the wire.
pub mod hex_hash {
    use super::Hash;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::hash_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "sender_blockchain_address")]
    pub sender: String,
    #[serde(rename = "recipient_blockchain_address")]
    pub recipient: String,
    pub value: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, value: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            value,
        }
    }

    /// Canonical encoding: the wire JSON with fields in declaration order.
    /// Leaf input for the merkle tree and the message that gets signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("transaction encoding is infallible")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashPreimage<'a> {
    nonce: u64,
    previous_hash: String,
    transactions: &'a [Transaction],
}

/// Digest over exactly `{nonce, previousHash, transactions}`.
///
/// Mining and verification both go through here so they always agree on the
/// shape being hashed. Index, timestamp, difficulty and merkle root are block
/// metadata and are not part of the preimage.
pub fn block_hash(nonce: u64, previous_hash: &Hash, transactions: &[Transaction]) -> Hash {
    let preimage = HashPreimage {
        nonce,
        previous_hash: hex::encode(previous_hash),
        transactions,
    };
    sha256(&serde_json::to_vec(&preimage).expect("preimage encoding is infallible"))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64,
    pub nonce: u64,
    #[serde(with = "hex_hash")]
    pub previous_hash: Hash,
    #[serde(with = "hex_hash")]
    pub current_hash: Hash,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub index: u64,
    #[serde(with = "hex_hash")]
    pub merkle_root: Hash,
}

impl Block {
    /// Seal a block whose nonce has already been found.
    pub fn new(
        index: u64,
        nonce: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Self {
        Self {
            timestamp: now_nanos(),
            nonce,
            previous_hash,
            current_hash: block_hash(nonce, &previous_hash, &transactions),
            merkle_root: merkle_root(&transactions),
            transactions,
            difficulty,
            index,
        }
    }

    /// Genesis links to itself: its previous hash is its own hash.
    pub fn genesis(difficulty: u32) -> Self {
        let current_hash = block_hash(0, &[0u8; HASH_SIZE], &[]);
        Self {
            timestamp: now_nanos(),
            nonce: 0,
            previous_hash: current_hash,
            current_hash,
            transactions: vec![],
            difficulty,
            index: 1,
            merkle_root: merkle_root(&[]),
        }
    }

    pub fn hash(&self) -> Hash {
        block_hash(self.nonce, &self.previous_hash, &self.transactions)
    }
}

pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Order-sensitive commitment to a transaction list. An odd node at the end
/// of a level is carried up unchanged.
pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return sha256(&[]);
    }
    let mut level: Vec<Hash> = txs.iter().map(|t| sha256(&t.canonical_bytes())).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [a, b] => {
                    let mut hasher = Sha256::new();
                    hasher.update(a);
                    hasher.update(b);
                    let digest = hasher.finalize();
                    let mut out = [0u8; HASH_SIZE];
                    out.copy_from_slice(&digest[..]);
                    next.push(out);
                }
                [odd] => next.push(*odd),
                _ => unreachable!("chunks(2) yields one or two items"),
            }
        }
        level = next;
    }
    level[0]
}

/// `GET /chain` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
}

impl ChainResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmountResponse {
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::new("Alice", "Bob", 10.0),
            Transaction::new("Bob", "Charlie", 5.0),
            Transaction::new("Charlie", "Dave", 2.5),
        ]
    }

    fn pair(a: &Hash, b: &Hash) -> Hash {
        let mut bytes = a.to_vec();
        bytes.extend_from_slice(b);
        sha256(&bytes)
    }

    #[test]
    fn merkle_root_empty_txs() {
        let root = merkle_root(&[]);
        assert_eq!(
            hex::encode(root),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn merkle_root_single_tx() {
        let txs = vec![Transaction::new("Alice", "Bob", 10.0)];
        assert_eq!(merkle_root(&txs), sha256(&txs[0].canonical_bytes()));
    }

    #[test]
    fn merkle_root_two_txs() {
        let txs = &sample_txs()[..2];
        let h1 = sha256(&txs[0].canonical_bytes());
        let h2 = sha256(&txs[1].canonical_bytes());
        assert_eq!(merkle_root(txs), pair(&h1, &h2));
    }

    #[test]
    fn merkle_root_three_txs_promotes_odd_leaf() {
        let txs = sample_txs();
        let leaves: Vec<Hash> = txs.iter().map(|t| sha256(&t.canonical_bytes())).collect();
        let expected = pair(&pair(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(merkle_root(&txs), expected);
    }

    #[test]
    fn merkle_root_five_txs() {
        let txs: Vec<Transaction> = (0..5)
            .map(|i| Transaction::new(format!("User{i}"), format!("User{}", i + 1), i as f64))
            .collect();
        let l: Vec<Hash> = txs.iter().map(|t| sha256(&t.canonical_bytes())).collect();
        let level1 = [pair(&l[0], &l[1]), pair(&l[2], &l[3]), l[4]];
        let level2 = [pair(&level1[0], &level1[1]), level1[2]];
        assert_eq!(merkle_root(&txs), pair(&level2[0], &level2[1]));
    }

    #[test]
    fn merkle_root_is_order_sensitive() {
        let txs = sample_txs();
        let mut swapped = txs.clone();
        swapped.swap(0, 1);
        assert_ne!(merkle_root(&txs), merkle_root(&swapped));
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("Alice", "Bob", 10.5);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"sender_blockchain_address":"Alice","recipient_blockchain_address":"Bob","value":10.5}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn block_hash_ignores_metadata() {
        let mut block = Block::new(2, 7, [3u8; 32], sample_txs(), 4);
        let before = block.hash();
        block.timestamp += 1;
        block.difficulty = 8;
        block.index = 99;
        block.merkle_root = [0u8; 32];
        assert_eq!(block.hash(), before);
        assert_eq!(block.current_hash, before);
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let txs = sample_txs();
        assert_ne!(block_hash(0, &[0u8; 32], &txs), block_hash(1, &[0u8; 32], &txs));
    }

    #[test]
    fn block_hash_changes_with_transaction_value() {
        let mut txs = sample_txs();
        let before = block_hash(0, &[0u8; 32], &txs);
        txs[1].value = 6.0;
        assert_ne!(before, block_hash(0, &[0u8; 32], &txs));
    }

    #[test]
    fn genesis_block_is_self_referential() {
        let genesis = Block::genesis(4);
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.previous_hash, genesis.current_hash);
        assert_eq!(genesis.merkle_root, merkle_root(&[]));
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.current_hash, Block::genesis(6).current_hash);
    }

    #[test]
    fn block_serialization_uses_hex_and_camel_case() {
        let block = Block::new(2, 42, [0xab; 32], sample_txs(), 4);
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["previousHash"], hex::encode([0xab; 32]));
        assert_eq!(value["currentHash"], hex::encode(block.current_hash));
        assert_eq!(value["merkleRoot"], hex::encode(block.merkle_root));
        assert_eq!(value["nonce"], 42);
        assert_eq!(value["index"], 2);

        let decoded: Block = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.current_hash);
    }

    #[test]
    fn chain_decode_rejects_short_hash() {
        let body = r#"{"chain":[{"timestamp":1,"nonce":0,"previousHash":"abcd","currentHash":"abcd","transactions":[],"difficulty":4,"index":1,"merkleRoot":"abcd"}]}"#;
        let err = ChainResponse::decode(body.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[test]
    fn chain_decode_rejects_missing_field() {
        let body = r#"{"chain":[{"timestamp":1,"nonce":0,"transactions":[]}]}"#;
        assert!(ChainResponse::decode(body.as_bytes()).is_err());
    }

    #[test]
    fn hash_from_hex_errors() {
        assert!(matches!(hash_from_hex("zz"), Err(LedgerError::Hex(_))));
        assert!(matches!(
            hash_from_hex("00ff"),
            Err(LedgerError::Length {
                expected: 32,
                actual: 2
            })
        ));
        assert_eq!(hash_from_hex(&"11".repeat(32)).unwrap(), [0x11; 32]);
    }

    #[test]
    fn timestamps_are_positive_and_ordered() {
        let first = now_nanos();
        let second = now_nanos();
        assert!(first > 0);
        assert!(second >= first);
        assert!(Block::new(2, 0, [0u8; 32], vec![], 1).timestamp >= first);
    }
}
