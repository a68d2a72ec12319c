//! EIP-712 hashing of Safe transactions
//!
//! Implements the typed-data hash the Safe contracts verify signatures
//! against. Every owner computing the hash of the same transaction for the
//! same Safe on the same chain arrives at the same `safeTxHash`.

use crate::core::{Address, B256, U256};
use crate::multisig::SafeTransactionData;
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain type since Safe 1.3.0
pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

/// Domain type before Safe 1.3.0 (no chain id)
pub const LEGACY_DOMAIN_TYPE: &str = "EIP712Domain(address verifyingContract)";

sol! {
    /// The typed transaction owners sign
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}

/// Safe 1.0.0 called `baseGas` `dataGas`
mod v1_0_0 {
    alloy_sol_types::sol! {
        struct SafeTx {
            address to;
            uint256 value;
            bytes data;
            uint8 operation;
            uint256 safeTxGas;
            uint256 dataGas;
            uint256 gasPrice;
            address gasToken;
            address refundReceiver;
            uint256 nonce;
        }
    }
}

impl From<&SafeTransactionData> for SafeTx {
    fn from(tx: &SafeTransactionData) -> Self {
        Self {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.as_u8(),
            safeTxGas: tx.safe_tx_gas,
            baseGas: tx.base_gas,
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: U256::from(tx.nonce),
        }
    }
}

impl From<&SafeTransactionData> for v1_0_0::SafeTx {
    fn from(tx: &SafeTransactionData) -> Self {
        Self {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.as_u8(),
            safeTxGas: tx.safe_tx_gas,
            dataGas: tx.base_gas,
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: U256::from(tx.nonce),
        }
    }
}

/// Deployed Safe contract versions with distinct hashing rules
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SafeVersion {
    V1_0_0,
    V1_1_1,
    V1_2_0,
    #[default]
    V1_3_0,
    V1_4_1,
}

impl SafeVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafeVersion::V1_0_0 => "1.0.0",
            SafeVersion::V1_1_1 => "1.1.1",
            SafeVersion::V1_2_0 => "1.2.0",
            SafeVersion::V1_3_0 => "1.3.0",
            SafeVersion::V1_4_1 => "1.4.1",
        }
    }

    /// Whether the domain separator commits to the chain id
    pub fn domain_has_chain_id(&self) -> bool {
        *self >= SafeVersion::V1_3_0
    }
}

impl fmt::Display for SafeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafeVersion {
    type Err = String;

    /// Accepts the service's `"1.3.0"` and `"1.3.0+L2"` forms
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base = s.split('+').next().unwrap_or(s).trim();
        match base {
            "1.0.0" => Ok(SafeVersion::V1_0_0),
            "1.1.1" => Ok(SafeVersion::V1_1_1),
            "1.2.0" => Ok(SafeVersion::V1_2_0),
            "1.3.0" => Ok(SafeVersion::V1_3_0),
            "1.4.1" => Ok(SafeVersion::V1_4_1),
            other => Err(format!("unsupported Safe version: {}", other)),
        }
    }
}

impl Serialize for SafeVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SafeVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The signing domain of one account: `{ [chainId,] verifyingContract }`
pub fn safe_domain(chain_id: u64, safe: &Address, version: SafeVersion) -> Eip712Domain {
    let chain_id = version.domain_has_chain_id().then(|| U256::from(chain_id));
    Eip712Domain::new(None, None, chain_id, Some(*safe), None)
}

pub fn domain_separator(chain_id: u64, safe: &Address, version: SafeVersion) -> B256 {
    safe_domain(chain_id, safe, version).separator()
}

/// `hashStruct(SafeTx)`
pub fn safe_tx_struct_hash(tx: &SafeTransactionData, version: SafeVersion) -> B256 {
    match version {
        SafeVersion::V1_0_0 => v1_0_0::SafeTx::from(tx).eip712_hash_struct(),
        _ => SafeTx::from(tx).eip712_hash_struct(),
    }
}

/// The `safeTxHash`: `keccak256(0x19 || 0x01 || domainSeparator || hashStruct(SafeTx))`
pub fn safe_tx_hash(
    chain_id: u64,
    safe: &Address,
    version: SafeVersion,
    tx: &SafeTransactionData,
) -> B256 {
    let domain = safe_domain(chain_id, safe, version);
    match version {
        SafeVersion::V1_0_0 => v1_0_0::SafeTx::from(tx).eip712_signing_hash(&domain),
        _ => SafeTx::from(tx).eip712_signing_hash(&domain),
    }
}
