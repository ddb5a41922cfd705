use crate::{block_hash, Hash, Transaction};
use rayon::prelude::*;
use tracing::debug;

/// Number of leading `'0'` characters in the hex rendering of `hash`.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// True when the hash of `{nonce, previous_hash, transactions}` starts with
/// `difficulty` zero hex digits.
pub fn valid_proof(
    nonce: u64,
    previous_hash: &Hash,
    transactions: &[Transaction],
    difficulty: u32,
) -> bool {
    leading_zero_nibbles(&block_hash(nonce, previous_hash, transactions)) >= difficulty
}

/// Smallest nonce satisfying [`valid_proof`]. Blocks the calling thread until
/// one is found; there is no timeout and no cancellation.
///
/// `find_first` keeps the answer identical to a sequential scan from zero
/// while rayon spreads the candidates over its pool.
pub fn proof_of_work(previous_hash: &Hash, transactions: &[Transaction], difficulty: u32) -> u64 {
    let nonce = (0u64..u64::MAX)
        .into_par_iter()
        .find_first(|nonce| valid_proof(*nonce, previous_hash, transactions, difficulty))
        .expect("nonce space exhausted (practically impossible)");
    debug!(nonce, difficulty, "proof of work found");
    nonce
}
