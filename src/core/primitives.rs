//! Ethereum primitives and wire-format helpers
//!
//! The value types come from `alloy-primitives`. The serde helpers cover
//! the quirks of the transaction service: integers that arrive either as
//! JSON numbers or decimal strings, uint256 amounts written back as decimal
//! strings, addresses it only accepts checksummed, and `null` byte strings.

pub use alloy_primitives::{Address, Bytes, B256, U256};

use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u256(self) -> Result<U256, String> {
        match self {
            NumberOrString::Number(n) => Ok(U256::from(n)),
            NumberOrString::String(s) => {
                U256::from_str(s.trim()).map_err(|e| format!("invalid number {:?}: {}", s, e))
            }
        }
    }
}

/// `U256` as a decimal string, accepted from a number or a (decimal or `0x`) string
pub mod dec_u256 {
    use super::{NumberOrString, U256};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        NumberOrString::deserialize(deserializer)?
            .into_u256()
            .map_err(serde::de::Error::custom)
    }
}

/// `u64` written as a JSON number, accepted from either form
pub mod flex_u64 {
    use super::NumberOrString;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = NumberOrString::deserialize(deserializer)?
            .into_u256()
            .map_err(serde::de::Error::custom)?;
        u64::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// EIP-55 checksummed address on the way out
pub mod checksummed {
    use super::Address;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_checksum(None))
    }
}

/// Byte strings where the service may send `null` for empty
pub mod nullable_bytes {
    use super::Bytes;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        Ok(Option::<Bytes>::deserialize(deserializer)?.unwrap_or_default())
    }
}
