use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid public key")]
    PublicKey,

    #[error("invalid private key")]
    PrivateKey,

    #[error("invalid signature")]
    Signature,

    #[error("transaction request is missing `{0}`")]
    MissingField(&'static str),

    #[error("peer {peer} failed: {reason}")]
    Peer { peer: String, reason: String },

    #[error("peer {0} timed out")]
    PeerTimeout(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
