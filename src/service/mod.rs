//! Transaction relay service
//!
//! Owners exchange proposals and signatures through the relay before anyone
//! executes on chain. [`TransactionService`] is the client contract;
//! [`SafeApiClient`] talks to the hosted Safe Transaction Service over HTTP
//! and [`InMemoryService`] keeps everything in process.

pub mod client;
pub mod memory;
pub mod types;

use crate::chain::ChainError;
use crate::core::{Address, B256};
use crate::crypto::KeyError;
use async_trait::async_trait;
use thiserror::Error;

pub use client::{ClientOptions, RetryPolicy, SafeApiClient};
pub use memory::InMemoryService;
pub use types::{
    Delegate, OwnerSafes, Page, ProposeTransactionBody, ProposeTransactionProps, SafeInfo,
    SafeMultisigConfirmation, SafeMultisigTransaction, ServiceInfo, SignatureResponse,
    SingletonInfo,
};

/// Errors reported by the relay service or its client
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Transaction {0} has already been proposed")]
    DuplicateProposal(String),
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),
    #[error("Invalid signature from {0}")]
    InvalidSignature(Address),
    #[error("{0} is not an owner of the account")]
    NotAnOwner(Address),
    #[error("Service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("No transaction service known for chain {0}")]
    UnknownChain(u64),
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("Crypto error: {0}")]
    Key(#[from] KeyError),
}

impl ServiceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Http(e) => e.is_connect() || e.is_timeout(),
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Client side of the transaction relay
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn service_info(&self) -> ServiceResult<ServiceInfo>;

    async fn singletons(&self) -> ServiceResult<Vec<SingletonInfo>>;

    async fn safe_info(&self, safe: &Address) -> ServiceResult<SafeInfo>;

    async fn safes_by_owner(&self, owner: &Address) -> ServiceResult<OwnerSafes>;

    async fn delegates(&self, safe: &Address) -> ServiceResult<Page<Delegate>>;

    /// Store a new proposal together with the proposer's signature
    ///
    /// Fails with `DuplicateProposal` if the hash is already known; the
    /// stored proposal is left untouched.
    async fn propose_transaction(&self, props: ProposeTransactionProps) -> ServiceResult<()>;

    /// Unexecuted proposals at or above the account nonce, oldest first
    async fn pending_transactions(
        &self,
        safe: &Address,
    ) -> ServiceResult<Page<SafeMultisigTransaction>>;

    /// Append an owner signature to a stored proposal
    async fn confirm_transaction(
        &self,
        safe_tx_hash: &B256,
        signature: &[u8],
    ) -> ServiceResult<SignatureResponse>;

    async fn get_transaction(&self, safe_tx_hash: &B256)
        -> ServiceResult<SafeMultisigTransaction>;
}
