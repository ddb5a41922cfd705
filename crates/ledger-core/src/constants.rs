pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const PUBLIC_KEY_HEX_SIZE: usize = HASH_HEX_SIZE * 2;
pub const SIGNATURE_HEX_SIZE: usize = HASH_HEX_SIZE * 2;

pub const MIN_DIFFICULTY: u32 = 4;
pub const MAX_DIFFICULTY: u32 = 8;

pub const MINING_SENDER: &str = "THE BLOCKCHAIN";
pub const MINING_REWARD: f64 = 1.0;

pub const MINING_INTERVAL_SECS: u64 = 20;
pub const DIFFICULTY_ADJUSTMENT_SECS: u64 = 20;
pub const NEIGHBOR_SYNC_SECS: u64 = 10;
pub const PEER_TIMEOUT_MILLIS: u64 = 3_000;
