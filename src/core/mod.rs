//! Core value types
//!
//! This module contains the building blocks shared by every layer:
//! - Addresses, 32-byte hashes and uint256 amounts (from `alloy-primitives`)
//! - Wire-format serde helpers
//! - Ether unit conversion

pub mod primitives;
pub mod units;

pub use primitives::{Address, Bytes, B256, U256};
pub use units::{format_ether, format_units, parse_ether, parse_units, UnitError, ETHER_DECIMALS};
