//! Proposal / confirmation / execution workflow
//!
//! Drives one withdrawal through the cosigning protocol:
//!
//! ```text
//! Uninitialized -> WalletReady -> TransactionBuilt -> Proposed -> Confirmed -> Executed
//! ```
//!
//! Steps run strictly in order and the first error aborts the run; calling a
//! step out of order fails with [`WorkflowError::InvalidTransition`].

use crate::chain::{ChainProvider, TxReceipt};
use crate::core::{Address, B256, U256};
use crate::crypto::KeyPair;
use crate::multisig::{SafeAccountConfig, SafeTransaction, SafeTransactionDataPartial};
use crate::sdk::{Safe, SafeError, SafeFactory};
use crate::service::{
    ProposeTransactionProps, ServiceError, SignatureResponse, TransactionService,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Uninitialized,
    WalletReady,
    TransactionBuilt,
    Proposed,
    Confirmed,
    Executed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Uninitialized => "uninitialized",
            WorkflowState::WalletReady => "wallet-ready",
            WorkflowState::TransactionBuilt => "transaction-built",
            WorkflowState::Proposed => "proposed",
            WorkflowState::Confirmed => "confirmed",
            WorkflowState::Executed => "executed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Cannot {step} in state {state}")]
    InvalidTransition {
        step: &'static str,
        state: WorkflowState,
    },
    #[error("No pending transactions for {0}")]
    NoPendingTransactions(Address),
    #[error(transparent)]
    Safe(#[from] SafeError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// A co-signer's confirmation of the first pending proposal
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub safe_tx_hash: B256,
    pub response: SignatureResponse,
}

/// Outcome of the execute step
#[derive(Debug, Clone)]
pub struct Execution {
    pub receipt: TxReceipt,
    pub balance_before: U256,
    pub balance_after: U256,
}

/// One run of the cosigning protocol on behalf of a proposing owner
pub struct Workflow {
    provider: Arc<dyn ChainProvider>,
    service: Arc<dyn TransactionService>,
    proposer: KeyPair,
    state: WorkflowState,
    safe: Option<Safe>,
    transaction: Option<SafeTransaction>,
    safe_tx_hash: Option<B256>,
}

impl Workflow {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        service: Arc<dyn TransactionService>,
        proposer: KeyPair,
    ) -> Self {
        Self {
            provider,
            service,
            proposer,
            state: WorkflowState::Uninitialized,
            safe: None,
            transaction: None,
            safe_tx_hash: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn safe(&self) -> Option<&Safe> {
        self.safe.as_ref()
    }

    pub fn transaction(&self) -> Option<&SafeTransaction> {
        self.transaction.as_ref()
    }

    /// Hash of the proposal this run is tracking
    pub fn safe_tx_hash(&self) -> Option<B256> {
        self.safe_tx_hash
    }

    fn expect_state(&self, expected: WorkflowState, step: &'static str) -> Result<(), WorkflowError> {
        if self.state != expected {
            return Err(WorkflowError::InvalidTransition {
                step,
                state: self.state,
            });
        }
        Ok(())
    }

    fn ready_safe(&self, step: &'static str) -> Result<&Safe, WorkflowError> {
        self.safe.as_ref().ok_or(WorkflowError::InvalidTransition {
            step,
            state: self.state,
        })
    }

    fn advance(&mut self, next: WorkflowState) {
        log::debug!("Workflow {} -> {}", self.state, next);
        self.state = next;
    }

    /// Use an account that is already deployed
    pub async fn init_existing(&mut self, address: Address) -> Result<&Safe, WorkflowError> {
        self.expect_state(WorkflowState::Uninitialized, "load a wallet")?;
        let safe = Safe::load(self.provider.clone(), self.proposer.clone(), address).await?;
        log::info!("Using existing account {}", address);

        self.advance(WorkflowState::WalletReady);
        Ok(&*self.safe.insert(safe))
    }

    /// Deploy a new account with the proposer as deployer
    pub async fn deploy(
        &mut self,
        config: SafeAccountConfig,
        salt_nonce: u64,
    ) -> Result<&Safe, WorkflowError> {
        self.expect_state(WorkflowState::Uninitialized, "deploy a wallet")?;
        let safe = SafeFactory::new(self.provider.clone(), self.proposer.clone())
            .deploy_safe(config, salt_nonce)
            .await?;

        self.advance(WorkflowState::WalletReady);
        Ok(&*self.safe.insert(safe))
    }

    /// Fund the account; only valid before a transaction is built
    pub async fn deposit(
        &mut self,
        depositor: &KeyPair,
        amount: U256,
    ) -> Result<TxReceipt, WorkflowError> {
        self.expect_state(WorkflowState::WalletReady, "deposit")?;
        let safe = self.ready_safe("deposit")?;
        Ok(safe.deposit(depositor, amount).await?)
    }

    /// Build a plain value transfer out of the account
    pub async fn build_withdrawal(
        &mut self,
        to: Address,
        amount: U256,
    ) -> Result<&SafeTransaction, WorkflowError> {
        self.expect_state(WorkflowState::WalletReady, "build a transaction")?;
        let safe = self.ready_safe("build a transaction")?;
        let tx = safe
            .create_transaction(SafeTransactionDataPartial::transfer(to, amount))
            .await?;
        log::info!("Built withdrawal of {} wei to {} (nonce {})", amount, to, tx.data.nonce);

        self.advance(WorkflowState::TransactionBuilt);
        Ok(&*self.transaction.insert(tx))
    }

    /// Sign the built transaction as the proposer and submit it to the relay
    pub async fn propose(&mut self) -> Result<B256, WorkflowError> {
        self.expect_state(WorkflowState::TransactionBuilt, "propose")?;
        let safe = self.ready_safe("propose")?;
        let tx = self
            .transaction
            .as_ref()
            .ok_or(WorkflowError::InvalidTransition {
                step: "propose",
                state: self.state,
            })?;

        let hash = safe.transaction_hash(tx);
        let signature = safe.sign_transaction_hash(&hash)?;
        self.service
            .propose_transaction(ProposeTransactionProps {
                safe_address: safe.address(),
                safe_transaction_data: tx.data.clone(),
                safe_tx_hash: hash,
                sender_address: safe.signer_address(),
                sender_signature: signature.data,
                origin: None,
            })
            .await?;
        log::info!("Proposed {}", hash);

        self.safe_tx_hash = Some(hash);
        self.advance(WorkflowState::Proposed);
        Ok(hash)
    }

    /// Confirm the first pending proposal with another owner's key
    pub async fn confirm(&mut self, co_signer: &KeyPair) -> Result<Confirmation, WorkflowError> {
        self.expect_state(WorkflowState::Proposed, "confirm")?;
        let safe = self.ready_safe("confirm")?;

        let pending = self.service.pending_transactions(&safe.address()).await?;
        let first = pending
            .results
            .first()
            .ok_or(WorkflowError::NoPendingTransactions(safe.address()))?;
        let hash = first.safe_tx_hash;

        let signature = safe.connect(co_signer.clone()).sign_transaction_hash(&hash)?;
        let response = self.service.confirm_transaction(&hash, &signature.data).await?;
        log::info!("{} confirmed {}", co_signer.address(), hash);

        self.safe_tx_hash = Some(hash);
        self.advance(WorkflowState::Confirmed);
        Ok(Confirmation {
            safe_tx_hash: hash,
            response,
        })
    }

    /// Fetch the confirmed proposal from the relay and execute it as the proposer
    pub async fn execute(&mut self) -> Result<Execution, WorkflowError> {
        self.expect_state(WorkflowState::Confirmed, "execute")?;
        let safe = self.ready_safe("execute")?;
        let hash = self.safe_tx_hash.ok_or(WorkflowError::InvalidTransition {
            step: "execute",
            state: self.state,
        })?;

        let balance_before = safe.balance().await?;
        let stored = self.service.get_transaction(&hash).await?;
        let receipt = safe.execute_transaction(&stored.to_safe_transaction()).await?;
        let balance_after = safe.balance().await?;

        self.advance(WorkflowState::Executed);
        Ok(Execution {
            receipt,
            balance_before,
            balance_after,
        })
    }
}
