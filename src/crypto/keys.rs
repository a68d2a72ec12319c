//! ECDSA key management for Ethereum-style signers
//!
//! Provides key pair generation, address derivation, recoverable signing
//! and signer recovery on the secp256k1 curve.

use crate::core::{Address, B256};
use alloy_primitives::eip191_hash_message;
use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use thiserror::Error;

/// Length of an `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),
    #[error("Unsupported signature type v={0}")]
    UnsupportedSignatureType(u8),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// How a transaction hash is turned into a signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SigningMethod {
    /// `eth_sign` over the hash, `v` shifted by 4 (31/32)
    #[default]
    EthSign,
    /// Raw ECDSA over the EIP-712 digest (27/28)
    Eip712,
}

/// A secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key (`0x` optional)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let raw = hex_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// The account address controlled by this key
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte hash, returning `r || s || v`
    pub fn sign_hash(&self, hash: &B256, method: SigningMethod) -> Result<Vec<u8>, KeyError> {
        let (digest, v_offset) = match method {
            SigningMethod::EthSign => (eth_message_hash(hash), 31u8),
            SigningMethod::Eip712 => (*hash, 27u8),
        };

        let secp = Secp256k1::new();
        let message = Message::from_digest(digest.0);
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
        out.extend_from_slice(&compact);
        out.push(v_offset + recovery_id.to_i32() as u8);
        Ok(out)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Digest signed by `eth_sign`: `keccak256("\x19Ethereum Signed Message:\n32" || hash)`
pub fn eth_message_hash(hash: &B256) -> B256 {
    eip191_hash_message(hash)
}

/// Convert a public key to an account address
///
/// Address = last 20 bytes of keccak256(uncompressed point without the 0x04 tag)
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_raw_public_key(&uncompressed[1..])
}

/// Whether `v` marks an ECDSA owner signature (27/28 or `eth_sign` 31/32)
pub fn is_ecdsa_v(v: u8) -> bool {
    matches!(v, 27 | 28 | 31 | 32)
}

/// Recover the address that produced `signature` over `hash`
///
/// Only ECDSA signatures are accepted: `v` 27/28 over the hash itself or
/// 31/32 over its `eth_sign` digest. The contract and approved-hash markers
/// (`v` 0 and 1) are rejected.
pub fn recover_signer(hash: &B256, signature: &[u8]) -> Result<Address, KeyError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(KeyError::InvalidSignatureLength(signature.len()));
    }

    let v = signature[64];
    let (digest, recovery) = match v {
        27 | 28 => (*hash, v - 27),
        31 | 32 => (eth_message_hash(hash), v - 31),
        other => return Err(KeyError::UnsupportedSignatureType(other)),
    };

    let recovery_id =
        RecoveryId::from_i32(recovery as i32).map_err(|_| KeyError::InvalidSignature)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|_| KeyError::InvalidSignature)?;

    let secp = Secp256k1::new();
    let message = Message::from_digest(digest.0);
    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(public_key_to_address(&public_key))
}
