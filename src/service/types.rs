//! Wire types of the transaction service API

use crate::core::{primitives, Address, Bytes, B256, U256};
use crate::crypto::SafeVersion;
use crate::multisig::{OperationType, SafeSignature, SafeTransaction, SafeTransactionData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /v1/about/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub api_version: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// A deployed singleton (master copy) known to the service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SingletonInfo {
    pub address: Address,
    pub version: String,
    #[serde(default)]
    pub deployer: String,
    #[serde(default)]
    pub deployed_block_number: u64,
    #[serde(default)]
    pub last_indexed_block_number: u64,
    #[serde(default)]
    pub l2: bool,
}

/// `GET /v1/safes/{address}/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeInfo {
    pub address: Address,
    #[serde(with = "primitives::flex_u64")]
    pub nonce: u64,
    pub threshold: usize,
    pub owners: Vec<Address>,
    #[serde(default)]
    pub master_copy: Option<Address>,
    #[serde(default)]
    pub modules: Vec<Address>,
    #[serde(default)]
    pub fallback_handler: Option<Address>,
    #[serde(default)]
    pub guard: Option<Address>,
    pub version: Option<SafeVersion>,
}

/// `GET /v1/owners/{address}/safes/`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerSafes {
    pub safes: Vec<Address>,
}

/// `GET /v2/delegates/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Delegate {
    pub safe: Option<Address>,
    pub delegate: Address,
    pub delegator: Address,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Paginated list response
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// A single page holding every result
    pub fn single(results: Vec<T>) -> Self {
        Self {
            count: results.len(),
            next: None,
            previous: None,
            results,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeMultisigConfirmation {
    pub owner: Address,
    pub submission_date: DateTime<Utc>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    pub signature: Bytes,
    #[serde(default)]
    pub signature_type: String,
}

impl SafeMultisigConfirmation {
    pub fn to_signature(&self) -> SafeSignature {
        SafeSignature::new(self.owner, self.signature.clone())
    }
}

/// A multisig transaction as stored by the service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeMultisigTransaction {
    pub safe: Address,
    pub to: Address,
    #[serde(with = "primitives::dec_u256")]
    pub value: U256,
    #[serde(default, deserialize_with = "primitives::nullable_bytes::deserialize")]
    pub data: Bytes,
    pub operation: OperationType,
    pub gas_token: Address,
    #[serde(with = "primitives::dec_u256")]
    pub safe_tx_gas: U256,
    #[serde(with = "primitives::dec_u256")]
    pub base_gas: U256,
    #[serde(with = "primitives::dec_u256")]
    pub gas_price: U256,
    pub refund_receiver: Address,
    #[serde(with = "primitives::flex_u64")]
    pub nonce: u64,
    #[serde(default)]
    pub execution_date: Option<DateTime<Utc>>,
    pub submission_date: DateTime<Utc>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    pub safe_tx_hash: B256,
    #[serde(default)]
    pub proposer: Option<Address>,
    #[serde(default)]
    pub executor: Option<Address>,
    pub is_executed: bool,
    #[serde(default)]
    pub is_successful: Option<bool>,
    #[serde(default)]
    pub origin: Option<String>,
    pub confirmations_required: usize,
    #[serde(default)]
    pub confirmations: Vec<SafeMultisigConfirmation>,
    #[serde(default)]
    pub trusted: bool,
}

impl SafeMultisigTransaction {
    pub fn transaction_data(&self) -> SafeTransactionData {
        SafeTransactionData {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation,
            safe_tx_gas: self.safe_tx_gas,
            base_gas: self.base_gas,
            gas_price: self.gas_price,
            gas_token: self.gas_token,
            refund_receiver: self.refund_receiver,
            nonce: self.nonce,
        }
    }

    /// Rebuild the signable transaction with every confirmation attached
    pub fn to_safe_transaction(&self) -> SafeTransaction {
        let mut tx = SafeTransaction::new(self.transaction_data());
        for confirmation in &self.confirmations {
            tx.add_signature(confirmation.to_signature());
        }
        tx
    }

    pub fn confirmed_by(&self, owner: &Address) -> bool {
        self.confirmations.iter().any(|c| c.owner == *owner)
    }
}

/// Arguments of `propose_transaction`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposeTransactionProps {
    pub safe_address: Address,
    pub safe_transaction_data: SafeTransactionData,
    pub safe_tx_hash: B256,
    pub sender_address: Address,
    pub sender_signature: Bytes,
    pub origin: Option<String>,
}

/// JSON body of `POST /v1/safes/{address}/multisig-transactions/`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposeTransactionBody {
    #[serde(flatten)]
    pub transaction: SafeTransactionData,
    pub contract_transaction_hash: B256,
    #[serde(serialize_with = "primitives::checksummed::serialize")]
    pub sender: Address,
    pub signature: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl From<ProposeTransactionProps> for ProposeTransactionBody {
    fn from(props: ProposeTransactionProps) -> Self {
        Self {
            transaction: props.safe_transaction_data,
            contract_transaction_hash: props.safe_tx_hash,
            sender: props.sender_address,
            signature: props.sender_signature,
            origin: props.origin,
        }
    }
}

/// Body of a confirmation request and of its response
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureResponse {
    pub signature: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_service_transaction() {
        let body = json!({
            "safe": "0xF188d41FD181f94960C5451D7ff6FdbcDf201a71",
            "to": "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045",
            "value": "50000000000000000",
            "data": null,
            "operation": 0,
            "gasToken": "0x0000000000000000000000000000000000000000",
            "safeTxGas": 0,
            "baseGas": "0",
            "gasPrice": "0",
            "refundReceiver": "0x0000000000000000000000000000000000000000",
            "nonce": "3",
            "executionDate": null,
            "submissionDate": "2023-05-01T10:00:00Z",
            "modified": "2023-05-01T10:05:00Z",
            "blockNumber": null,
            "transactionHash": null,
            "safeTxHash": "0x47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218",
            "proposer": "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23",
            "executor": null,
            "isExecuted": false,
            "isSuccessful": null,
            "confirmationsRequired": 2,
            "confirmations": [{
                "owner": "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23",
                "submissionDate": "2023-05-01T10:00:00Z",
                "transactionHash": null,
                "signature": format!("0x{}", "11".repeat(64) + "1f"),
                "signatureType": "ETH_SIGN"
            }],
            "trusted": true,
            "signatures": null
        });

        let tx: SafeMultisigTransaction = serde_json::from_value(body).unwrap();
        assert_eq!(tx.value, U256::from(50_000_000_000_000_000u64));
        assert_eq!(tx.nonce, 3);
        assert!(tx.data.is_empty());
        assert_eq!(tx.confirmations.len(), 1);

        let owner = tx.confirmations[0].owner;
        assert!(tx.confirmed_by(&owner));

        let safe_tx = tx.to_safe_transaction();
        assert_eq!(safe_tx.signature_count(), 1);
        assert_eq!(safe_tx.signature(&owner).unwrap().v(), Some(0x1f));
    }

    #[test]
    fn test_propose_body_is_flat() {
        let props = ProposeTransactionProps {
            safe_address: Address::ZERO,
            safe_transaction_data: crate::multisig::SafeTransactionDataPartial::transfer(
                "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap(),
                U256::from(5),
            )
            .complete(0),
            safe_tx_hash: B256::ZERO,
            sender_address: "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".parse().unwrap(),
            sender_signature: Bytes::from(vec![0xab; 65]),
            origin: None,
        };

        let value = serde_json::to_value(ProposeTransactionBody::from(props)).unwrap();
        assert_eq!(value["to"], "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(value["value"], "5");
        assert_eq!(value["sender"], "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
        assert!(value.get("contractTransactionHash").is_some());
        assert!(value.get("origin").is_none());
    }

    #[test]
    fn test_decode_safe_info() {
        let body = json!({
            "address": "0x5298A93734C3D979eF1f23F78eBB871879A21F22",
            "nonce": 7,
            "threshold": 2,
            "owners": [
                "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23",
                "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
            ],
            "masterCopy": "0x3E5c63644E683549055b9Be8653de26E0B4CD36E",
            "modules": [],
            "fallbackHandler": "0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4",
            "guard": "0x0000000000000000000000000000000000000000",
            "version": "1.3.0+L2"
        });

        let info: SafeInfo = serde_json::from_value(body).unwrap();
        assert_eq!(info.nonce, 7);
        assert_eq!(info.version, Some(SafeVersion::V1_3_0));
        assert_eq!(info.owners.len(), 2);
        assert_eq!(
            info.fallback_handler,
            Some("0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4".parse().unwrap())
        );
    }
}
