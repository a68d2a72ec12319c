//! In-process chain
//!
//! Keeps balances and deployed multisig accounts in memory and checks
//! `execTransaction` calls the way the Safe contract does: the hash is
//! built with the account's current nonce, the first `threshold`
//! signatures must come from distinct owners in ascending order, and a
//! successful execution bumps the nonce so it can never run twice.

use super::{ChainError, ChainProvider, TxReceipt};
use crate::core::{Address, B256, U256};
use crate::crypto::{keccak256, recover_signer, safe_tx_hash, KeyPair, SafeVersion, SIGNATURE_LENGTH};
use crate::multisig::{OperationType, SafeAccountConfig, SafeState, SafeTransactionData};
use alloy_primitives::address;
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Chain id used by local development networks
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// `SafeProxyFactory` 1.3.0
const PROXY_FACTORY: Address = address!("a6B71E26C5e0845f74c812102Ca7114b6a896AB2");

#[derive(Debug, Clone)]
struct SafeAccount {
    owners: Vec<Address>,
    threshold: usize,
    nonce: u64,
    version: SafeVersion,
    fallback_handler: Option<Address>,
    executions: HashMap<B256, TxReceipt>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Address, U256>,
    safes: HashMap<Address, SafeAccount>,
    block_number: u64,
}

impl LedgerState {
    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn debit(&mut self, account: &Address, amount: U256) -> Result<(), ChainError> {
        let balance = self.balance(account);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(ChainError::InsufficientFunds {
                have: balance,
                need: amount,
            })?;
        self.balances.insert(*account, remaining);
        Ok(())
    }

    fn credit(&mut self, account: &Address, amount: U256) {
        let balance = self.balances.entry(*account).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn next_receipt(&mut self, from: Address, to: Address, tag: &[u8]) -> TxReceipt {
        self.block_number += 1;
        let transaction_hash = keccak256(
            [
                from.as_slice(),
                to.as_slice(),
                tag,
                &self.block_number.to_be_bytes()[..],
            ]
            .concat(),
        );
        TxReceipt {
            transaction_hash,
            block_number: self.block_number,
            from,
            to,
            success: true,
        }
    }
}

/// A simulated chain holding balances and multisig accounts
#[derive(Debug)]
pub struct LocalChain {
    chain_id: u64,
    state: RwLock<LedgerState>,
}

impl LocalChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Credit `amount` wei to an account out of thin air
    pub async fn fund(&self, account: &Address, amount: U256) {
        let mut state = self.state.write().await;
        state.credit(account, amount);
        log::debug!("Funded {} with {} wei", account, amount);
    }

    /// Address the proxy factory would assign to this configuration
    ///
    /// CREATE2 from the factory with `salt = keccak256(keccak256(setup) || saltNonce)`.
    pub fn predict_safe_address(config: &SafeAccountConfig, salt_nonce: u64) -> Address {
        let setup = (
            config.owners.clone(),
            U256::from(config.threshold as u64),
            config.fallback_handler.unwrap_or(Address::ZERO),
        )
            .abi_encode();
        let salt = keccak256((keccak256(&setup), U256::from(salt_nonce)).abi_encode_packed());
        PROXY_FACTORY.create2(salt.0, keccak256(b"GnosisSafeProxy").0)
    }

    /// Walk the first `threshold` signatures as `checkSignatures` does
    fn check_signatures(
        account: &SafeAccount,
        hash: &B256,
        signatures: &[u8],
        executor: &Address,
    ) -> Result<(), ChainError> {
        if signatures.len() < account.threshold * SIGNATURE_LENGTH {
            return Err(ChainError::Reverted(
                "GS020: signatures data too short".to_string(),
            ));
        }

        let mut last_owner = Address::ZERO;
        for chunk in signatures
            .chunks_exact(SIGNATURE_LENGTH)
            .take(account.threshold)
        {
            let owner = match chunk[64] {
                0 => {
                    return Err(ChainError::Reverted(
                        "GS021: contract signatures are not supported".to_string(),
                    ))
                }
                1 => {
                    let owner = Address::from_slice(&chunk[12..32]);
                    if owner != *executor {
                        return Err(ChainError::Reverted("GS025: hash not approved".to_string()));
                    }
                    owner
                }
                _ => recover_signer(hash, chunk)
                    .map_err(|_| ChainError::Reverted("GS026: invalid owner provided".to_string()))?,
            };

            if owner <= last_owner || !account.owners.contains(&owner) {
                return Err(ChainError::Reverted(
                    "GS026: invalid owner provided".to_string(),
                ));
            }
            last_owner = owner;
        }

        Ok(())
    }
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::new(LOCAL_CHAIN_ID)
    }
}

#[async_trait]
impl ChainProvider for LocalChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn balance(&self, address: &Address) -> Result<U256, ChainError> {
        Ok(self.state.read().await.balance(address))
    }

    async fn is_contract(&self, address: &Address) -> Result<bool, ChainError> {
        Ok(self.state.read().await.safes.contains_key(address))
    }

    async fn safe_state(&self, safe: &Address) -> Result<SafeState, ChainError> {
        let state = self.state.read().await;
        let account = state.safes.get(safe).ok_or(ChainError::NotASafe(*safe))?;
        Ok(SafeState {
            owners: account.owners.clone(),
            threshold: account.threshold,
            nonce: account.nonce,
            version: account.version,
            fallback_handler: account.fallback_handler,
        })
    }

    async fn deploy_safe(
        &self,
        deployer: &KeyPair,
        config: &SafeAccountConfig,
        salt_nonce: u64,
    ) -> Result<Address, ChainError> {
        config.validate()?;

        let address = Self::predict_safe_address(config, salt_nonce);
        let mut state = self.state.write().await;
        if state.safes.contains_key(&address) {
            return Err(ChainError::AlreadyDeployed(address));
        }

        state.safes.insert(
            address,
            SafeAccount {
                owners: config.owners.clone(),
                threshold: config.threshold,
                nonce: 0,
                version: SafeVersion::default(),
                fallback_handler: config.fallback_handler,
                executions: HashMap::new(),
            },
        );
        state.block_number += 1;

        log::info!(
            "Deployed {} account {} (deployer {})",
            config.description(),
            address,
            deployer.address()
        );
        Ok(address)
    }

    async fn transfer(
        &self,
        from: &KeyPair,
        to: &Address,
        value: U256,
    ) -> Result<TxReceipt, ChainError> {
        let sender = from.address();
        let mut state = self.state.write().await;
        state.debit(&sender, value)?;
        state.credit(to, value);
        Ok(state.next_receipt(sender, *to, &value.to_be_bytes::<32>()))
    }

    async fn exec_transaction(
        &self,
        executor: &KeyPair,
        safe: &Address,
        data: &SafeTransactionData,
        signatures: &[u8],
    ) -> Result<TxReceipt, ChainError> {
        let executor_address = executor.address();
        let mut state = self.state.write().await;

        let account = state.safes.get(safe).ok_or(ChainError::NotASafe(*safe))?.clone();

        // The contract hashes with its own nonce, not the caller's
        let mut effective = data.clone();
        effective.nonce = account.nonce;
        let hash = safe_tx_hash(self.chain_id, safe, account.version, &effective);

        Self::check_signatures(&account, &hash, signatures, &executor_address)?;

        if data.operation == OperationType::DelegateCall {
            return Err(ChainError::Reverted(
                "delegate calls are not simulated".to_string(),
            ));
        }

        state
            .debit(safe, data.value)
            .map_err(|_| ChainError::Reverted("GS013: safe transaction failed".to_string()))?;
        state.credit(&data.to, data.value);

        let receipt = state.next_receipt(executor_address, *safe, hash.as_slice());
        if let Some(account) = state.safes.get_mut(safe) {
            account.nonce += 1;
            account.executions.insert(hash, receipt.clone());
        }

        log::info!(
            "Executed {} on {} at block {}",
            hash,
            safe,
            receipt.block_number
        );
        Ok(receipt)
    }

    async fn execution(
        &self,
        safe: &Address,
        safe_tx_hash: &B256,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let state = self.state.read().await;
        let account = state.safes.get(safe).ok_or(ChainError::NotASafe(*safe))?;
        Ok(account.executions.get(safe_tx_hash).cloned())
    }
}
