//! Ether unit conversion
//!
//! Amounts are carried as `U256` wei throughout the crate.

use alloy_primitives::utils::{self, ParseUnits};
use alloy_primitives::U256;
use thiserror::Error;

/// Decimals of the native currency
pub const ETHER_DECIMALS: u8 = 18;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("Invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },
    #[error("Amount must not be negative: {0}")]
    Negative(String),
}

/// Parse a decimal string into base units (`parse_units("0.05", 18)`)
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, UnitError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UnitError::InvalidAmount {
            value: value.to_string(),
            reason: "empty".to_string(),
        });
    }

    match utils::parse_units(value, decimals) {
        Ok(ParseUnits::U256(amount)) => Ok(amount),
        Ok(ParseUnits::I256(_)) => Err(UnitError::Negative(value.to_string())),
        Err(e) => Err(UnitError::InvalidAmount {
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Format base units as a decimal string with trailing zeros trimmed
pub fn format_units(value: U256, decimals: u8) -> Result<String, UnitError> {
    utils::format_units(value, decimals)
        .map(|s| trim_fraction(&s))
        .map_err(|e| UnitError::InvalidAmount {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub fn parse_ether(value: &str) -> Result<U256, UnitError> {
    parse_units(value, ETHER_DECIMALS)
}

pub fn format_ether(wei: U256) -> String {
    trim_fraction(&utils::format_ether(wei))
}

fn trim_fraction(formatted: &str) -> String {
    if !formatted.contains('.') {
        return formatted.to_string();
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
