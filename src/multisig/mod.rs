//! Multi-signature account and transaction types
//!
//! M-of-N accounts where M owner signatures over a transaction's
//! `safeTxHash` are required before it can execute.
//!
//! # Example
//!
//! ```ignore
//! use safe_cosign::multisig::{SafeAccountConfig, SafeTransaction, SafeTransactionDataPartial};
//!
//! // A 2-of-3 account
//! let config = SafeAccountConfig::new(vec![owner1, owner2, owner3], 2)?;
//!
//! // A withdrawal, nonce taken from the account
//! let data = SafeTransactionDataPartial::transfer(recipient, amount).complete(nonce);
//! let mut tx = SafeTransaction::new(data);
//!
//! // Collect signatures
//! tx.add_signature(signature1);
//! tx.add_signature(signature2);
//! ```

pub mod account;
pub mod transaction;

pub use account::{MultisigError, SafeAccountConfig, SafeState};
pub use transaction::{
    OperationType, SafeSignature, SafeTransaction, SafeTransactionData,
    SafeTransactionDataPartial,
};
