//! Cryptographic utilities
//!
//! This module provides:
//! - ECDSA key management (secp256k1) with Ethereum address derivation
//! - EIP-712 hashing of Safe transactions

pub mod eip712;
pub mod keys;

pub use alloy_primitives::keccak256;
pub use eip712::{domain_separator, safe_domain, safe_tx_hash, safe_tx_struct_hash, SafeVersion};
pub use keys::{
    eth_message_hash, is_ecdsa_v, public_key_to_address, recover_signer, KeyError, KeyPair,
    SigningMethod, SIGNATURE_LENGTH,
};
