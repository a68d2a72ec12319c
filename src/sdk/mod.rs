//! Wallet SDK
//!
//! Binds a signer to a multisig account and implements the client side of
//! the cosigning protocol: building transactions, computing their
//! `safeTxHash`, signing it, and executing once enough owners have signed.

pub mod factory;
pub mod safe;

use crate::chain::ChainError;
use crate::core::{Address, UnitError};
use crate::crypto::KeyError;
use crate::multisig::MultisigError;
use thiserror::Error;

pub use factory::SafeFactory;
pub use safe::Safe;

/// Errors raised by the wallet SDK
#[derive(Error, Debug)]
pub enum SafeError {
    #[error("No multisig account deployed at {0}")]
    NotDeployed(Address),
    #[error("{0} is not an owner of this account")]
    NotAnOwner(Address),
    #[error("Insufficient signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: usize },
    #[error("Invalid signature from {0}")]
    InvalidSignature(Address),
    #[error("Transaction with nonce {nonce} already executed (current nonce {current})")]
    AlreadyExecuted { nonce: u64, current: u64 },
    #[error("Transaction nonce {nonce} is ahead of the account nonce {current}")]
    NonceTooHigh { nonce: u64, current: u64 },
    #[error("Invalid account configuration: {0}")]
    Config(#[from] MultisigError),
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
    #[error("Invalid amount: {0}")]
    Unit(#[from] UnitError),
}
