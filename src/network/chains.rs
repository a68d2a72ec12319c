//! Known chains and their hosted services

use crate::core::{Address, B256};
use serde::Serialize;

// =============================================================================
// Chain Entry
// =============================================================================

/// A chain with its transaction service and block explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub chain_id: u64,
    /// Human readable name
    pub name: &'static str,
    /// EIP-3770 short name used by the web app
    pub short_name: &'static str,
    /// Network segment of `safe-transaction-<network>.safe.global`
    pub tx_service: Option<&'static str>,
    /// Block explorer base URL
    pub explorer: Option<&'static str>,
}

impl ChainInfo {
    const fn hosted(
        chain_id: u64,
        name: &'static str,
        short_name: &'static str,
        tx_service: &'static str,
        explorer: &'static str,
    ) -> Self {
        Self {
            chain_id,
            name,
            short_name,
            tx_service: Some(tx_service),
            explorer: Some(explorer),
        }
    }

    /// Base URL of the transaction service API
    pub fn service_url(&self) -> Option<String> {
        self.tx_service
            .map(|network| format!("https://safe-transaction-{}.safe.global/api", network))
    }

    pub fn address_url(&self, address: &Address) -> Option<String> {
        self.explorer
            .map(|explorer| format!("{}/address/{}", explorer, address))
    }

    pub fn tx_url(&self, hash: &B256) -> Option<String> {
        self.explorer.map(|explorer| format!("{}/tx/{}", explorer, hash))
    }

    /// Link to the account in the Safe web app
    pub fn app_url(&self, safe: &Address) -> Option<String> {
        self.tx_service?;
        Some(format!(
            "https://app.safe.global/home?safe={}:{}",
            self.short_name, safe
        ))
    }
}

// =============================================================================
// Registry
// =============================================================================

pub const LOCAL: ChainInfo = ChainInfo {
    chain_id: crate::chain::LOCAL_CHAIN_ID,
    name: "Local",
    short_name: "local",
    tx_service: None,
    explorer: None,
};

pub const CHAINS: &[ChainInfo] = &[
    ChainInfo::hosted(1, "Ethereum", "eth", "mainnet", "https://etherscan.io"),
    ChainInfo::hosted(5, "Goerli", "gor", "goerli", "https://goerli.etherscan.io"),
    ChainInfo::hosted(10, "Optimism", "oeth", "optimism", "https://optimistic.etherscan.io"),
    ChainInfo::hosted(100, "Gnosis Chain", "gno", "gnosis-chain", "https://gnosisscan.io"),
    ChainInfo::hosted(137, "Polygon", "matic", "polygon", "https://polygonscan.com"),
    ChainInfo::hosted(1101, "Polygon zkEVM", "zkevm", "zkevm", "https://zkevm.polygonscan.com"),
    ChainInfo::hosted(5000, "Mantle", "mnt", "mantle", "https://explorer.mantle.xyz"),
    ChainInfo::hosted(8453, "Base", "base", "base", "https://basescan.org"),
    ChainInfo::hosted(42161, "Arbitrum One", "arb1", "arbitrum", "https://arbiscan.io"),
    ChainInfo::hosted(84532, "Base Sepolia", "basesep", "base-sepolia", "https://sepolia.basescan.org"),
    ChainInfo::hosted(11155111, "Sepolia", "sep", "sepolia", "https://sepolia.etherscan.io"),
    ChainInfo::hosted(1313161554, "Aurora", "aurora", "aurora", "https://explorer.mainnet.aurora.dev"),
    LOCAL,
];

/// Look up a chain by id
pub fn chain_info(chain_id: u64) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.chain_id == chain_id)
}

/// Look up a chain by its short name or service network name
pub fn chain_by_name(name: &str) -> Option<&'static ChainInfo> {
    let name = name.trim().to_lowercase();
    CHAINS
        .iter()
        .find(|c| c.short_name == name || c.tx_service == Some(name.as_str()))
}
