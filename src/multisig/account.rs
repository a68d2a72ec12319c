//! Multisig account configuration
//!
//! An owner set plus the M-of-N threshold that governs it.

use crate::core::Address;
use crate::crypto::SafeVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to multisig configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Owner list is empty")]
    NoOwners,
    #[error("Duplicate owner: {0}")]
    DuplicateOwner(Address),
    #[error("The zero address cannot be an owner")]
    ZeroOwner,
}

/// Configuration of a multisig account to deploy
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeAccountConfig {
    /// Authorized signers, in the order given at deployment
    pub owners: Vec<Address>,
    /// Minimum signatures required (M in M-of-N)
    pub threshold: usize,
    /// Optional fallback handler contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_handler: Option<Address>,
}

impl SafeAccountConfig {
    /// Create a new configuration, validating owners and threshold
    ///
    /// # Errors
    /// Returns error if the owner list is empty or contains duplicates or
    /// the zero address, or if the threshold is outside `1..=owners.len()`
    pub fn new(owners: Vec<Address>, threshold: usize) -> Result<Self, MultisigError> {
        let config = Self {
            owners,
            threshold,
            fallback_handler: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_fallback_handler(mut self, handler: Address) -> Self {
        self.fallback_handler = Some(handler);
        self
    }

    pub fn validate(&self) -> Result<(), MultisigError> {
        if self.owners.is_empty() {
            return Err(MultisigError::NoOwners);
        }

        if self.threshold == 0 {
            return Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }

        if self.threshold > self.owners.len() {
            return Err(MultisigError::InvalidThreshold(format!(
                "threshold {} exceeds owner count {}",
                self.threshold,
                self.owners.len()
            )));
        }

        let mut sorted = self.owners.clone();
        sorted.sort();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(MultisigError::DuplicateOwner(pair[0]));
            }
        }

        if sorted.iter().any(|a| a.is_zero()) {
            return Err(MultisigError::ZeroOwner);
        }

        Ok(())
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.owners.len())
    }
}

/// On-chain state of a deployed multisig account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeState {
    pub owners: Vec<Address>,
    pub threshold: usize,
    pub nonce: u64,
    pub version: SafeVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_handler: Option<Address>,
}

impl SafeState {
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owners.contains(address)
    }
}
