//! Safe Cosign: off-chain multisig coordination for Safe wallets
//!
//! This crate implements the proposal / confirmation / execution flow of an
//! M-of-N multisig account:
//! - EIP-712 `safeTxHash` computation, bit-compatible with the Safe contracts
//! - secp256k1 owner signatures (`eth_sign` and typed-data flavours)
//! - A wallet SDK to deploy, load, sign for and execute on an account
//! - A transaction service client (HTTP) plus an in-memory relay
//! - A strictly sequential workflow driving one withdrawal end to end
//!
//! # Example
//!
//! ```rust
//! use safe_cosign::chain::LocalChain;
//! use safe_cosign::core::U256;
//! use safe_cosign::crypto::KeyPair;
//! use safe_cosign::multisig::{SafeAccountConfig, SafeTransactionDataPartial};
//! use safe_cosign::sdk::SafeFactory;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let chain = Arc::new(LocalChain::default());
//! let owners: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
//! let config = SafeAccountConfig::new(owners.iter().map(|k| k.address()).collect(), 2).unwrap();
//!
//! // Deploy and fund a 2-of-3 account
//! let safe = SafeFactory::new(chain.clone(), owners[0].clone())
//!     .deploy_safe(config, 0)
//!     .await
//!     .unwrap();
//! chain.fund(&safe.address(), U256::from(100)).await;
//!
//! // Two owners sign, the first executes
//! let to = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();
//! let mut tx = safe
//!     .create_transaction(SafeTransactionDataPartial::transfer(to, U256::from(10)))
//!     .await
//!     .unwrap();
//! safe.sign_transaction(&mut tx).await.unwrap();
//! safe.connect(owners[1].clone()).sign_transaction(&mut tx).await.unwrap();
//! let receipt = safe.execute_transaction(&tx).await.unwrap();
//! assert!(receipt.success);
//! # });
//! ```

pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod network;
pub mod sdk;
pub mod service;
pub mod workflow;

// Re-export commonly used types
pub use chain::{ChainProvider, LocalChain};
pub use config::Config;
pub use core::{format_ether, parse_ether, Address, B256, U256};
pub use crypto::{safe_tx_hash, KeyPair, SafeVersion, SigningMethod};
pub use multisig::{
    SafeAccountConfig, SafeSignature, SafeTransaction, SafeTransactionData,
    SafeTransactionDataPartial,
};
pub use sdk::{Safe, SafeError, SafeFactory};
pub use service::{InMemoryService, SafeApiClient, ServiceError, TransactionService};
pub use workflow::{Workflow, WorkflowError, WorkflowState};
