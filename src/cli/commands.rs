//! CLI commands for the cosigning tool
//!
//! Implements the command handlers behind the CLI interface.

use crate::chain::{ChainProvider, LocalChain};
use crate::config::Config;
use crate::core::{format_ether, parse_ether, Address, B256};
use crate::crypto::KeyPair;
use crate::multisig::SafeAccountConfig;
use crate::network::{self, ChainInfo, CHAINS};
use crate::service::{InMemoryService, SafeMultisigTransaction, TransactionService};
use crate::workflow::Workflow;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Owners in the walkthrough account
const WALKTHROUGH_OWNERS: usize = 3;

/// Signatures required by the walkthrough account
const WALKTHROUGH_THRESHOLD: usize = 2;

/// Amount the first owner deposits before the withdrawal
const WALKTHROUGH_DEPOSIT: &str = "0.1";

/// Starting balance of the first owner on the local chain
const WALKTHROUGH_FAUCET: &str = "1";

/// Default withdrawal recipient (vitalik.eth)
pub const DEFAULT_RECIPIENT: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

// =============================================================================
// Registry
// =============================================================================

/// List known chains
pub fn cmd_networks() -> CliResult<()> {
    println!("🌐 Known chains");
    for chain in CHAINS {
        let service = chain
            .service_url()
            .unwrap_or_else(|| "(no hosted service)".to_string());
        println!(
            "   ├─ {:>10} | {:<6} | {:<14} | {}",
            chain.chain_id, chain.short_name, chain.name, service
        );
    }
    Ok(())
}

// =============================================================================
// Service queries
// =============================================================================

pub async fn cmd_service_info(service: &dyn TransactionService) -> CliResult<()> {
    let info = service.service_info().await?;

    println!("🛰️  Transaction Service");
    println!("   ├─ Name: {}", info.name);
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ API version: {}", info.api_version);
    println!("   ├─ Host: {}", info.host);
    println!("   └─ Secure: {}", info.secure);

    Ok(())
}

pub async fn cmd_service_singletons(service: &dyn TransactionService) -> CliResult<()> {
    let singletons = service.singletons().await?;

    if singletons.is_empty() {
        println!("📭 No singletons reported");
        return Ok(());
    }

    println!("🧩 Singletons ({}):", singletons.len());
    for singleton in &singletons {
        println!(
            "   ├─ {} | v{} | {} | block {}",
            singleton.address,
            singleton.version,
            if singleton.l2 { "L2" } else { "L1" },
            singleton.deployed_block_number
        );
    }

    Ok(())
}

pub async fn cmd_safe_info(service: &dyn TransactionService, address: &Address) -> CliResult<()> {
    let info = service.safe_info(address).await?;

    println!("🔐 Safe {}", info.address);
    println!(
        "   ├─ Threshold: {}-of-{}",
        info.threshold,
        info.owners.len()
    );
    println!("   ├─ Nonce: {}", info.nonce);
    if let Some(version) = info.version {
        println!("   ├─ Version: {}", version);
    }
    if let Some(master_copy) = info.master_copy {
        println!("   ├─ Singleton: {}", master_copy);
    }
    if let Some(handler) = info.fallback_handler {
        println!("   ├─ Fallback handler: {}", handler);
    }
    println!("   └─ Owners:");
    for owner in &info.owners {
        println!("      └─ {}", owner);
    }

    Ok(())
}

pub async fn cmd_safe_delegates(
    service: &dyn TransactionService,
    address: &Address,
) -> CliResult<()> {
    let delegates = service.delegates(address).await?;

    if delegates.results.is_empty() {
        println!("📭 No delegates for {}", address);
        return Ok(());
    }

    println!("🤝 Delegates of {} ({}):", address, delegates.count);
    for delegate in &delegates.results {
        let label = if delegate.label.is_empty() {
            "-"
        } else {
            delegate.label.as_str()
        };
        println!(
            "   ├─ {} (delegator {}) {}",
            delegate.delegate, delegate.delegator, label
        );
    }

    Ok(())
}

pub async fn cmd_owner_safes(service: &dyn TransactionService, owner: &Address) -> CliResult<()> {
    let owned = service.safes_by_owner(owner).await?;

    if owned.safes.is_empty() {
        println!("📭 {} owns no Safes", owner);
        return Ok(());
    }

    println!("🔐 Safes owned by {}:", owner);
    for safe in &owned.safes {
        println!("   └─ {}", safe);
    }

    Ok(())
}

pub async fn cmd_pending(service: &dyn TransactionService, address: &Address) -> CliResult<()> {
    let pending = service.pending_transactions(address).await?;

    if pending.results.is_empty() {
        println!("📭 No pending transactions for {}", address);
        return Ok(());
    }

    println!("📬 Pending transactions ({}):", pending.count);
    for tx in &pending.results {
        print_pending(tx);
    }

    Ok(())
}

fn print_pending(tx: &SafeMultisigTransaction) {
    println!(
        "   ├─ {} | nonce {} | {} ETH to {} | {}/{} confirmations",
        tx.safe_tx_hash,
        tx.nonce,
        format_ether(tx.value),
        tx.to,
        tx.confirmations.len(),
        tx.confirmations_required
    );
}

// =============================================================================
// Walkthrough
// =============================================================================

fn print_link(label: &str, link: Option<String>) {
    if let Some(link) = link {
        println!("   {}: {}", label, link);
    }
}

/// Owner keys from the environment, topped up with fresh keys
fn walkthrough_owners(config: &Config) -> Vec<KeyPair> {
    let mut owners: Vec<KeyPair> = config
        .owner_keys
        .iter()
        .take(WALKTHROUGH_OWNERS)
        .cloned()
        .collect();

    while owners.len() < WALKTHROUGH_OWNERS {
        let key = KeyPair::generate();
        println!(
            "🔑 Generated key for owner {}: {}",
            owners.len() + 1,
            key.address()
        );
        owners.push(key);
    }
    owners
}

/// Deploy a 2-of-3 Safe, fund it, and withdraw through propose/confirm/execute
pub async fn cmd_walkthrough(config: &Config, amount: &str, to: &Address) -> CliResult<()> {
    let amount = parse_ether(amount)?;
    let deposit = parse_ether(WALKTHROUGH_DEPOSIT)?;

    if config.rpc_url.is_some() {
        log::warn!("RPC_URL is set but the walkthrough runs on a local in-process chain");
    }
    if let Some(safe) = config.safe_address {
        log::warn!(
            "SAFE_ADDRESS {} is ignored; the walkthrough deploys a fresh Safe on the local chain",
            safe
        );
    }

    let chain = Arc::new(LocalChain::default());
    let service = Arc::new(InMemoryService::new(chain.clone()));
    let links: Option<&ChainInfo> = network::chain_info(chain.chain_id());

    let owners = walkthrough_owners(config);
    for (i, owner) in owners.iter().enumerate() {
        println!("👤 Owner {}: {}", i + 1, owner.address());
    }
    chain
        .fund(&owners[0].address(), parse_ether(WALKTHROUGH_FAUCET)?)
        .await;

    let mut workflow = Workflow::new(chain.clone(), service.clone(), owners[0].clone());

    // Deploy
    println!("\n🚀 Deploying Safe...");
    let safe_config = SafeAccountConfig::new(
        owners.iter().map(|k| k.address()).collect(),
        WALKTHROUGH_THRESHOLD,
    )?;
    let safe_address = workflow.deploy(safe_config, 0).await?.address();
    service.track_safe(safe_address).await;
    println!("✅ Your Safe has been deployed: {}", safe_address);
    if let Some(chain_info) = links {
        print_link("Explorer", chain_info.address_url(&safe_address));
        print_link("App", chain_info.app_url(&safe_address));
    }

    // Deposit
    let receipt = workflow.deposit(&owners[0], deposit).await?;
    println!("💰 Fundraising. Deposited {} ETH", format_ether(deposit));
    print_tx(links, "Deposit transaction", &receipt.transaction_hash);

    // Build and propose
    let tx = workflow.build_withdrawal(*to, amount).await?;
    println!(
        "\n🧾 Created transaction: {} ETH to {} (nonce {})",
        format_ether(tx.data.value),
        tx.data.to,
        tx.data.nonce
    );
    let safe_tx_hash = workflow.propose().await?;
    println!("📝 Proposed transaction {}", safe_tx_hash);

    // Confirm with the second owner
    cmd_pending(service.as_ref(), &safe_address).await?;
    let confirmation = workflow.confirm(&owners[1]).await?;
    println!(
        "✍️  Transaction confirmed by owner 2: {}",
        confirmation.response.signature
    );

    // Execute with the first owner
    let execution = workflow.execute().await?;
    println!(
        "\n[Before Transaction] Safe Balance: {} ETH",
        format_ether(execution.balance_before)
    );
    println!("⚡ Transaction executed:");
    print_tx(links, "Execution transaction", &execution.receipt.transaction_hash);
    println!(
        "[After Transaction] Safe Balance: {} ETH",
        format_ether(execution.balance_after)
    );

    Ok(())
}

fn print_tx(chain: Option<&ChainInfo>, label: &str, hash: &B256) {
    match chain.and_then(|c| c.tx_url(hash)) {
        Some(link) => println!("   {}: {}", label, link),
        None => println!("   {}: {}", label, hash),
    }
}
