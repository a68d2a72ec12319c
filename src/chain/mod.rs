//! Chain access
//!
//! `ChainProvider` is the seam between the wallet SDK and whatever node
//! serves account state and accepts transactions. `LocalChain` is an
//! in-process implementation that enforces the multisig contract rules,
//! used by the offline walkthrough and the tests.

pub mod local;

use crate::core::{Address, B256, U256};
use crate::crypto::KeyPair;
use crate::multisig::{MultisigError, SafeAccountConfig, SafeState, SafeTransactionData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::{LocalChain, LOCAL_CHAIN_ID};

/// Errors reported by a chain provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No multisig account deployed at {0}")]
    NotASafe(Address),
    #[error("Account already deployed at {0}")]
    AlreadyDeployed(Address),
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: U256, need: U256 },
    #[error("Execution reverted: {0}")]
    Reverted(String),
    #[error("Invalid account configuration: {0}")]
    InvalidConfig(#[from] MultisigError),
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Result of a mined transaction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub success: bool,
}

/// Account state and transaction submission for one chain
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Numeric id of the chain this provider talks to
    fn chain_id(&self) -> u64;

    async fn balance(&self, address: &Address) -> Result<U256, ChainError>;

    /// Whether contract code exists at `address`
    async fn is_contract(&self, address: &Address) -> Result<bool, ChainError>;

    async fn safe_state(&self, safe: &Address) -> Result<SafeState, ChainError>;

    /// Deploy a new multisig account through the proxy factory
    async fn deploy_safe(
        &self,
        deployer: &KeyPair,
        config: &SafeAccountConfig,
        salt_nonce: u64,
    ) -> Result<Address, ChainError>;

    /// Plain value transfer from an externally owned account
    async fn transfer(
        &self,
        from: &KeyPair,
        to: &Address,
        value: U256,
    ) -> Result<TxReceipt, ChainError>;

    /// Call `execTransaction` on the account with packed owner signatures
    async fn exec_transaction(
        &self,
        executor: &KeyPair,
        safe: &Address,
        data: &SafeTransactionData,
        signatures: &[u8],
    ) -> Result<TxReceipt, ChainError>;

    /// Receipt of the execution of `safe_tx_hash`, if it has been executed
    async fn execution(
        &self,
        safe: &Address,
        safe_tx_hash: &B256,
    ) -> Result<Option<TxReceipt>, ChainError>;
}
