use crate::{merkle_root, pow::valid_proof, Block};
use tracing::warn;

/// Link, proof and merkle checks over every non-genesis block. Stops at the
/// first violation.
///
/// The genesis block is taken as-is, and a block's stored `difficulty` is
/// trusted when re-checking its proof since the hash does not commit to it.
pub fn valid_chain(chain: &[Block]) -> bool {
    for pair in chain.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.previous_hash != prev.current_hash {
            warn!(index = block.index, "previous hash does not link");
            return false;
        }
        if !valid_proof(
            block.nonce,
            &block.previous_hash,
            &block.transactions,
            block.difficulty,
        ) {
            warn!(index = block.index, nonce = block.nonce, "invalid proof of work");
            return false;
        }
        if block.merkle_root != merkle_root(&block.transactions) {
            warn!(index = block.index, "merkle root does not match transactions");
            return false;
        }
    }
    true
}
