//! Runtime configuration
//!
//! Read from the environment; command line flags override individual fields.
//! Owner keys come from `OWNER_1_PRIVATE_KEY`, `OWNER_2_PRIVATE_KEY`, ... and
//! are never echoed back, not even in error messages.

use crate::core::Address;
use crate::crypto::KeyPair;
use crate::network::{self, ChainInfo};
use thiserror::Error;

/// Chain used when `CHAIN_ID` is not set (Sepolia)
pub const DEFAULT_CHAIN_ID: u64 = 11155111;

/// Owner key variables are read from 1 up to this index
pub const MAX_OWNER_KEYS: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown chain {0:?}: expected a chain id or a known short name")]
    InvalidChainId(String),
    #[error("Invalid address in {var}: {reason}")]
    InvalidAddress { var: String, reason: String },
    #[error("Invalid private key in {0}")]
    InvalidKey(String),
    #[error("No transaction service known for chain {0}; set TX_SERVICE_URL")]
    NoServiceUrl(u64),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    pub tx_service_url: Option<String>,
    pub safe_address: Option<Address>,
    /// Signers in `OWNER_n_PRIVATE_KEY` order
    pub owner_keys: Vec<KeyPair>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            rpc_url: None,
            tx_service_url: None,
            safe_address: None,
            owner_keys: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let chain_id = match get("CHAIN_ID") {
            Some(raw) => parse_chain(&raw)?,
            None => DEFAULT_CHAIN_ID,
        };

        let safe_address = match get("SAFE_ADDRESS") {
            Some(raw) => Some(raw.parse::<Address>().map_err(|e| {
                ConfigError::InvalidAddress {
                    var: "SAFE_ADDRESS".to_string(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let mut owner_keys = Vec::new();
        for index in 1..=MAX_OWNER_KEYS {
            let var = format!("OWNER_{}_PRIVATE_KEY", index);
            let Some(raw) = get(&var) else { break };
            let key = KeyPair::from_private_key_hex(&raw).map_err(|_| ConfigError::InvalidKey(var))?;
            owner_keys.push(key);
        }

        let config = Self {
            chain_id,
            rpc_url: get("RPC_URL"),
            tx_service_url: get("TX_SERVICE_URL"),
            safe_address,
            owner_keys,
        };
        log::debug!(
            "Config: chain {}, {} owner key(s), safe {:?}",
            config.chain_id,
            config.owner_keys.len(),
            config.safe_address
        );
        Ok(config)
    }

    /// Switch chains by id (`"5"`) or short name (`"gor"`, `"sepolia"`)
    pub fn select_chain(&mut self, chain: &str) -> Result<(), ConfigError> {
        self.chain_id = parse_chain(chain)?;
        Ok(())
    }

    pub fn chain(&self) -> Option<&'static ChainInfo> {
        network::chain_info(self.chain_id)
    }

    /// Explicit `TX_SERVICE_URL`, else the hosted service of the chain
    pub fn service_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.tx_service_url {
            return Ok(url.clone());
        }
        self.chain()
            .and_then(ChainInfo::service_url)
            .ok_or(ConfigError::NoServiceUrl(self.chain_id))
    }

    /// Owner key `n`, counting from 1 like the variable names
    pub fn owner(&self, n: usize) -> Option<&KeyPair> {
        n.checked_sub(1).and_then(|i| self.owner_keys.get(i))
    }
}

/// Numeric ids pass through unchecked so custom chains work with `TX_SERVICE_URL`
fn parse_chain(raw: &str) -> Result<u64, ConfigError> {
    let raw = raw.trim();
    if let Ok(chain_id) = raw.parse::<u64>() {
        return Ok(chain_id);
    }
    network::chain_by_name(raw)
        .map(|chain| chain.chain_id)
        .ok_or_else(|| ConfigError::InvalidChainId(raw.to_string()))
}
