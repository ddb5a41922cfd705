//! ECDSA (secp256k1) checks gating transaction admission, plus the hex wire
//! forms of keys and signatures.
//!
//! Public keys travel as 128 hex chars (X || Y of the uncompressed point),
//! signatures as 128 hex chars (r || s).

use crate::constants::{MINING_SENDER, PUBLIC_KEY_HEX_SIZE, SIGNATURE_HEX_SIZE};
use crate::error::{LedgerError, Result};
use crate::{sha256, Transaction};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Check `signature` over the SHA-256 of the transaction's canonical encoding.
pub fn verify_transaction(
    public_key: &VerifyingKey,
    signature: &Signature,
    tx: &Transaction,
) -> bool {
    let digest = sha256(&tx.canonical_bytes());
    public_key.verify_prehash(&digest, signature).is_ok()
}

pub fn sign_transaction(key: &SigningKey, tx: &Transaction) -> Result<Signature> {
    let digest = sha256(&tx.canonical_bytes());
    PrehashSigner::<Signature>::sign_prehash(key, &digest).map_err(|_| LedgerError::Signature)
}

/// Rewards are minted locally and carry no signature.
pub fn is_mining_reward(tx: &Transaction) -> bool {
    tx.sender == MINING_SENDER
}

pub fn public_key_to_hex(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    hex::encode(&point.as_bytes()[1..])
}

pub fn public_key_from_hex(s: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(s)?;
    if bytes.len() * 2 != PUBLIC_KEY_HEX_SIZE {
        return Err(LedgerError::Length {
            expected: PUBLIC_KEY_HEX_SIZE / 2,
            actual: bytes.len(),
        });
    }
    let mut sec1 = Vec::with_capacity(bytes.len() + 1);
    sec1.push(0x04);
    sec1.extend_from_slice(&bytes);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| LedgerError::PublicKey)
}

pub fn signature_to_hex(signature: &Signature) -> String {
    hex::encode(signature.to_bytes())
}

pub fn signature_from_hex(s: &str) -> Result<Signature> {
    let bytes = hex::decode(s)?;
    if bytes.len() * 2 != SIGNATURE_HEX_SIZE {
        return Err(LedgerError::Length {
            expected: SIGNATURE_HEX_SIZE / 2,
            actual: bytes.len(),
        });
    }
    Signature::from_slice(&bytes).map_err(|_| LedgerError::Signature)
}

pub fn signing_key_from_hex(s: &str) -> Result<SigningKey> {
    let bytes = hex::decode(s)?;
    SigningKey::from_slice(&bytes).map_err(|_| LedgerError::PrivateKey)
}

/// First 20 bytes of SHA-256 over the uncompressed point, hex encoded.
pub fn address_from_public_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    hex::encode(&sha256(&point.as_bytes()[1..])[..20])
}

/// Inbound envelope for a signed transaction. Every field is required; a
/// missing one rejects the whole request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender_blockchain_address: Option<String>,
    pub recipient_blockchain_address: Option<String>,
    pub sender_public_key: Option<String>,
    pub value: Option<f64>,
    pub signature: Option<String>,
}

impl TransactionRequest {
    /// Build a fully populated envelope by signing with `key`.
    pub fn signed(key: &SigningKey, recipient: impl Into<String>, value: f64) -> Result<Self> {
        let public_key = key.verifying_key();
        let tx = Transaction::new(address_from_public_key(public_key), recipient, value);
        let signature = sign_transaction(key, &tx)?;
        Ok(Self::from_parts(&tx, public_key, &signature))
    }

    pub fn from_parts(tx: &Transaction, public_key: &VerifyingKey, signature: &Signature) -> Self {
        Self {
            sender_blockchain_address: Some(tx.sender.clone()),
            recipient_blockchain_address: Some(tx.recipient.clone()),
            sender_public_key: Some(public_key_to_hex(public_key)),
            value: Some(tx.value),
            signature: Some(signature_to_hex(signature)),
        }
    }

    pub fn validate(&self) -> bool {
        self.sender_blockchain_address.is_some()
            && self.recipient_blockchain_address.is_some()
            && self.sender_public_key.is_some()
            && self.value.is_some()
            && self.signature.is_some()
    }

    /// Decode into the transaction plus the material needed to verify it.
    pub fn into_parts(&self) -> Result<(Transaction, VerifyingKey, Signature)> {
        let sender = self
            .sender_blockchain_address
            .as_ref()
            .ok_or(LedgerError::MissingField("sender_blockchain_address"))?;
        let recipient = self
            .recipient_blockchain_address
            .as_ref()
            .ok_or(LedgerError::MissingField("recipient_blockchain_address"))?;
        let public_key = self
            .sender_public_key
            .as_deref()
            .ok_or(LedgerError::MissingField("sender_public_key"))?;
        let value = self.value.ok_or(LedgerError::MissingField("value"))?;
        let signature = self
            .signature
            .as_deref()
            .ok_or(LedgerError::MissingField("signature"))?;

        Ok((
            Transaction::new(sender.clone(), recipient.clone(), value),
            public_key_from_hex(public_key)?,
            signature_from_hex(signature)?,
        ))
    }
}
