//! Multisig transactions and their signatures
//!
//! A `SafeTransaction` is the transaction data every owner hashes plus the
//! owner signatures collected so far, at most one per owner.

use crate::core::{primitives, Address, Bytes, B256, U256};
use crate::crypto::{is_ecdsa_v, recover_signer, KeyError, SIGNATURE_LENGTH};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Call type executed by the multisig account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OperationType {
    #[default]
    Call,
    DelegateCall,
}

impl OperationType {
    pub fn as_u8(&self) -> u8 {
        match self {
            OperationType::Call => 0,
            OperationType::DelegateCall => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OperationType::Call),
            1 => Some(OperationType::DelegateCall),
            _ => None,
        }
    }
}

impl Serialize for OperationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        OperationType::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid operation {}", value)))
    }
}

/// The fields covered by the `safeTxHash`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransactionData {
    #[serde(serialize_with = "primitives::checksummed::serialize")]
    pub to: Address,
    #[serde(with = "primitives::dec_u256")]
    pub value: U256,
    #[serde(default, deserialize_with = "primitives::nullable_bytes::deserialize")]
    pub data: Bytes,
    pub operation: OperationType,
    #[serde(with = "primitives::dec_u256")]
    pub safe_tx_gas: U256,
    #[serde(with = "primitives::dec_u256")]
    pub base_gas: U256,
    #[serde(with = "primitives::dec_u256")]
    pub gas_price: U256,
    #[serde(serialize_with = "primitives::checksummed::serialize")]
    pub gas_token: Address,
    #[serde(serialize_with = "primitives::checksummed::serialize")]
    pub refund_receiver: Address,
    #[serde(with = "primitives::flex_u64")]
    pub nonce: u64,
}

/// Transaction data as supplied by a caller; omitted fields take defaults
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SafeTransactionDataPartial {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: Option<OperationType>,
    pub safe_tx_gas: Option<U256>,
    pub base_gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub gas_token: Option<Address>,
    pub refund_receiver: Option<Address>,
    pub nonce: Option<u64>,
}

impl SafeTransactionDataPartial {
    /// A plain value transfer
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Fill in defaults; `current_nonce` is used when no nonce was given
    pub fn complete(self, current_nonce: u64) -> SafeTransactionData {
        SafeTransactionData {
            to: self.to,
            value: self.value,
            data: self.data,
            operation: self.operation.unwrap_or_default(),
            safe_tx_gas: self.safe_tx_gas.unwrap_or_default(),
            base_gas: self.base_gas.unwrap_or_default(),
            gas_price: self.gas_price.unwrap_or_default(),
            gas_token: self.gas_token.unwrap_or(Address::ZERO),
            refund_receiver: self.refund_receiver.unwrap_or(Address::ZERO),
            nonce: self.nonce.unwrap_or(current_nonce),
        }
    }
}

/// A single owner signature over a `safeTxHash`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeSignature {
    /// Owner that produced the signature
    pub signer: Address,
    /// `r || s || v`
    pub data: Bytes,
}

impl SafeSignature {
    pub fn new(signer: Address, data: impl Into<Bytes>) -> Self {
        Self {
            signer,
            data: data.into(),
        }
    }

    /// Approval by the transaction sender itself (`v = 1`, `r` = owner, `s` = 0)
    pub fn pre_validated(owner: Address) -> Self {
        let mut data = Vec::with_capacity(SIGNATURE_LENGTH);
        data.extend_from_slice(owner.into_word().as_slice());
        data.extend_from_slice(&[0u8; 32]);
        data.push(1);
        Self::new(owner, data)
    }

    pub fn v(&self) -> Option<u8> {
        self.data.get(SIGNATURE_LENGTH - 1).copied()
    }

    pub fn is_pre_validated(&self) -> bool {
        self.data.len() == SIGNATURE_LENGTH && self.v() == Some(1)
    }

    /// An ECDSA owner signature, as opposed to the contract markers
    pub fn is_ecdsa(&self) -> bool {
        self.data.len() == SIGNATURE_LENGTH && self.v().is_some_and(is_ecdsa_v)
    }

    /// Recover the signing address; pre-validated signatures name their owner
    pub fn recover(&self, hash: &B256) -> Result<Address, KeyError> {
        if self.is_pre_validated() {
            return Ok(Address::from_slice(&self.data[12..32]));
        }
        recover_signer(hash, &self.data)
    }
}

/// A transaction together with the owner signatures collected so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeTransaction {
    pub data: SafeTransactionData,
    signatures: BTreeMap<Address, SafeSignature>,
}

impl SafeTransaction {
    pub fn new(data: SafeTransactionData) -> Self {
        Self {
            data,
            signatures: BTreeMap::new(),
        }
    }

    /// Attach a signature; returns `false` if this signer already signed
    pub fn add_signature(&mut self, signature: SafeSignature) -> bool {
        if self.signatures.contains_key(&signature.signer) {
            return false;
        }
        self.signatures.insert(signature.signer, signature);
        true
    }

    pub fn signature(&self, signer: &Address) -> Option<&SafeSignature> {
        self.signatures.get(signer)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &SafeSignature> {
        self.signatures.values()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Signers in ascending address order
    pub fn signed_by(&self) -> Vec<Address> {
        self.signatures.keys().copied().collect()
    }

    /// Signatures concatenated in ascending signer order, as the contract expects
    pub fn encoded_signatures(&self) -> Vec<u8> {
        self.signatures
            .values()
            .flat_map(|s| s.data.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{keccak256, KeyPair, SigningMethod};

    fn sample_data() -> SafeTransactionData {
        SafeTransactionDataPartial::transfer(
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap(),
            U256::from(50_000_000_000_000_000u64),
        )
        .complete(7)
    }

    #[test]
    fn test_partial_defaults() {
        let data = sample_data();
        assert_eq!(data.nonce, 7);
        assert_eq!(data.operation, OperationType::Call);
        assert_eq!(data.gas_token, Address::ZERO);
        assert!(data.data.is_empty());

        let explicit = SafeTransactionDataPartial::transfer(Address::ZERO, U256::from(1))
            .with_nonce(2)
            .complete(9);
        assert_eq!(explicit.nonce, 2);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample_data()).unwrap();
        assert_eq!(json["value"], "50000000000000000");
        assert_eq!(json["data"], "0x");
        assert_eq!(json["operation"], 0);
        assert_eq!(json["safeTxGas"], "0");
        assert_eq!(json["nonce"], 7);
        assert_eq!(json["to"], "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

        let back: SafeTransactionData = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_data());
    }

    #[test]
    fn test_one_signature_per_signer() {
        let kp = KeyPair::generate();
        let hash = keccak256(b"tx");
        let mut tx = SafeTransaction::new(sample_data());

        let sig = SafeSignature::new(kp.address(), kp.sign_hash(&hash, SigningMethod::EthSign).unwrap());
        assert!(tx.add_signature(sig.clone()));

        let again =
            SafeSignature::new(kp.address(), kp.sign_hash(&hash, SigningMethod::Eip712).unwrap());
        assert!(!tx.add_signature(again));
        assert_eq!(tx.signature_count(), 1);
        assert_eq!(tx.signature(&kp.address()), Some(&sig));
    }

    #[test]
    fn test_encoded_signatures_sorted_by_signer() {
        let mut keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let hash = keccak256(b"tx");
        let mut tx = SafeTransaction::new(sample_data());
        for kp in &keys {
            let data = kp.sign_hash(&hash, SigningMethod::EthSign).unwrap();
            tx.add_signature(SafeSignature::new(kp.address(), data));
        }

        keys.sort_by_key(|k| k.address());
        let encoded = tx.encoded_signatures();
        assert_eq!(encoded.len(), 3 * SIGNATURE_LENGTH);
        for (i, kp) in keys.iter().enumerate() {
            let chunk = &encoded[i * SIGNATURE_LENGTH..(i + 1) * SIGNATURE_LENGTH];
            assert_eq!(recover_signer(&hash, chunk).unwrap(), kp.address());
        }
    }

    #[test]
    fn test_pre_validated_signature() {
        let owner: Address = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".parse().unwrap();
        let sig = SafeSignature::pre_validated(owner);
        assert_eq!(sig.data.len(), SIGNATURE_LENGTH);
        assert!(sig.is_pre_validated());
        assert_eq!(sig.recover(&B256::ZERO).unwrap(), owner);
        assert!(!sig.is_ecdsa());

        let kp = KeyPair::generate();
        let signed = SafeSignature::new(
            kp.address(),
            kp.sign_hash(&B256::ZERO, SigningMethod::EthSign).unwrap(),
        );
        assert!(signed.is_ecdsa());
    }
}
