//! A signer bound to a deployed multisig account

use super::SafeError;
use crate::chain::{ChainError, ChainProvider, TxReceipt};
use crate::core::{Address, B256, U256};
use crate::crypto::{safe_tx_hash, KeyPair, SafeVersion, SigningMethod};
use crate::multisig::{SafeSignature, SafeTransaction, SafeTransactionDataPartial};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Handle on a multisig account for one signer identity
#[derive(Clone)]
pub struct Safe {
    provider: Arc<dyn ChainProvider>,
    signer: KeyPair,
    address: Address,
    chain_id: u64,
    version: SafeVersion,
    signing_method: SigningMethod,
}

impl Safe {
    /// Bind `signer` to the account at `address`
    ///
    /// # Errors
    /// `SafeError::NotDeployed` if no account contract exists at `address`
    pub async fn load(
        provider: Arc<dyn ChainProvider>,
        signer: KeyPair,
        address: Address,
    ) -> Result<Self, SafeError> {
        if !provider.is_contract(&address).await? {
            return Err(SafeError::NotDeployed(address));
        }

        let state = match provider.safe_state(&address).await {
            Ok(state) => state,
            Err(ChainError::NotASafe(_)) => return Err(SafeError::NotDeployed(address)),
            Err(e) => return Err(e.into()),
        };

        let chain_id = provider.chain_id();
        log::debug!(
            "Loaded {}-of-{} account {} on chain {} for signer {}",
            state.threshold,
            state.owners.len(),
            address,
            chain_id,
            signer.address()
        );

        Ok(Self {
            provider,
            signer,
            address,
            chain_id,
            version: state.version,
            signing_method: SigningMethod::default(),
        })
    }

    /// The same account, seen by another signer
    pub fn connect(&self, signer: KeyPair) -> Self {
        Self {
            signer,
            ..self.clone()
        }
    }

    pub fn with_signing_method(mut self, method: SigningMethod) -> Self {
        self.signing_method = method;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn version(&self) -> SafeVersion {
        self.version
    }

    pub async fn owners(&self) -> Result<Vec<Address>, SafeError> {
        Ok(self.provider.safe_state(&self.address).await?.owners)
    }

    pub async fn threshold(&self) -> Result<usize, SafeError> {
        Ok(self.provider.safe_state(&self.address).await?.threshold)
    }

    pub async fn nonce(&self) -> Result<u64, SafeError> {
        Ok(self.provider.safe_state(&self.address).await?.nonce)
    }

    pub async fn balance(&self) -> Result<U256, SafeError> {
        Ok(self.provider.balance(&self.address).await?)
    }

    pub async fn is_owner(&self, address: &Address) -> Result<bool, SafeError> {
        Ok(self.owners().await?.contains(address))
    }

    /// Send `amount` wei from `depositor` into the account
    pub async fn deposit(&self, depositor: &KeyPair, amount: U256) -> Result<TxReceipt, SafeError> {
        let receipt = self
            .provider
            .transfer(depositor, &self.address, amount)
            .await?;
        log::info!(
            "Deposited {} wei into {} ({})",
            amount,
            self.address,
            receipt.transaction_hash
        );
        Ok(receipt)
    }

    /// Build an unsigned transaction, defaulting the nonce to the account's
    pub async fn create_transaction(
        &self,
        partial: SafeTransactionDataPartial,
    ) -> Result<SafeTransaction, SafeError> {
        let nonce = match partial.nonce {
            Some(nonce) => nonce,
            None => self.nonce().await?,
        };
        Ok(SafeTransaction::new(partial.complete(nonce)))
    }

    /// The `safeTxHash` of `tx` for this account and chain
    pub fn transaction_hash(&self, tx: &SafeTransaction) -> B256 {
        safe_tx_hash(self.chain_id, &self.address, self.version, &tx.data)
    }

    /// Sign a `safeTxHash` with the bound signer
    pub fn sign_transaction_hash(&self, hash: &B256) -> Result<SafeSignature, SafeError> {
        let data = self.signer.sign_hash(hash, self.signing_method)?;
        Ok(SafeSignature::new(self.signer.address(), data))
    }

    /// Attach the bound signer's signature to `tx`
    ///
    /// Signing twice leaves the existing signature in place.
    pub async fn sign_transaction(&self, tx: &mut SafeTransaction) -> Result<(), SafeError> {
        let signer = self.signer.address();
        if !self.is_owner(&signer).await? {
            return Err(SafeError::NotAnOwner(signer));
        }

        let hash = self.transaction_hash(tx);
        let signature = self.sign_transaction_hash(&hash)?;
        if !tx.add_signature(signature) {
            log::debug!("{} already signed {}", signer, hash);
        }
        Ok(())
    }

    /// Submit `tx` with its collected signatures
    ///
    /// Every signature must recover to a distinct owner. When the signer
    /// executing is an owner that has not signed and the threshold is not
    /// yet met, its own approval is added as a pre-validated signature.
    ///
    /// # Errors
    /// `AlreadyExecuted` when the nonce has been used, `InsufficientSignatures`
    /// when fewer than `threshold` owners approved
    pub async fn execute_transaction(&self, tx: &SafeTransaction) -> Result<TxReceipt, SafeError> {
        let state = self.provider.safe_state(&self.address).await?;

        if tx.data.nonce < state.nonce {
            return Err(SafeError::AlreadyExecuted {
                nonce: tx.data.nonce,
                current: state.nonce,
            });
        }
        if tx.data.nonce > state.nonce {
            return Err(SafeError::NonceTooHigh {
                nonce: tx.data.nonce,
                current: state.nonce,
            });
        }

        let hash = self.transaction_hash(tx);
        let executor = self.signer.address();

        let mut approvals: BTreeMap<Address, SafeSignature> = BTreeMap::new();
        for signature in tx.signatures() {
            let recovered = signature
                .recover(&hash)
                .map_err(|_| SafeError::InvalidSignature(signature.signer))?;
            if recovered != signature.signer {
                return Err(SafeError::InvalidSignature(signature.signer));
            }
            if !state.is_owner(&recovered) {
                return Err(SafeError::NotAnOwner(recovered));
            }
            if signature.is_pre_validated() && recovered != executor {
                return Err(SafeError::InvalidSignature(recovered));
            }
            approvals.insert(recovered, signature.clone());
        }

        if approvals.len() < state.threshold
            && state.is_owner(&executor)
            && !approvals.contains_key(&executor)
        {
            log::debug!("Adding executor approval for {}", executor);
            approvals.insert(executor, SafeSignature::pre_validated(executor));
        }

        if approvals.len() < state.threshold {
            return Err(SafeError::InsufficientSignatures {
                have: approvals.len(),
                need: state.threshold,
            });
        }

        let packed: Vec<u8> = approvals
            .values()
            .flat_map(|s| s.data.iter().copied())
            .collect();

        log::info!(
            "Executing {} on {} with {} signature(s)",
            hash,
            self.address,
            approvals.len()
        );
        let receipt = self
            .provider
            .exec_transaction(&self.signer, &self.address, &tx.data, &packed)
            .await?;
        Ok(receipt)
    }
}

impl fmt::Debug for Safe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Safe")
            .field("address", &self.address)
            .field("signer", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LocalChain;
    use crate::multisig::SafeAccountConfig;
    use crate::sdk::SafeFactory;

    struct Fixture {
        chain: Arc<LocalChain>,
        owners: Vec<KeyPair>,
        safe: Safe,
    }

    async fn fixture(threshold: usize) -> Fixture {
        let chain = Arc::new(LocalChain::default());
        let owners: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let config =
            SafeAccountConfig::new(owners.iter().map(|k| k.address()).collect(), threshold)
                .unwrap();
        let safe = SafeFactory::new(chain.clone(), owners[0].clone())
            .deploy_safe(config, 0)
            .await
            .unwrap();
        chain.fund(&safe.address(), U256::from(1_000_000)).await;
        Fixture {
            chain,
            owners,
            safe,
        }
    }

    fn recipient() -> Address {
        "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap()
    }

    #[tokio::test]
    async fn test_load_requires_deployed_account() {
        let chain: Arc<dyn ChainProvider> = Arc::new(LocalChain::default());
        let result = Safe::load(chain, KeyPair::generate(), recipient()).await;
        assert!(matches!(result, Err(SafeError::NotDeployed(_))));
    }

    #[tokio::test]
    async fn test_hash_agrees_across_owners() {
        let fx = fixture(2).await;
        let tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();

        let hashes: Vec<B256> = fx
            .owners
            .iter()
            .map(|kp| fx.safe.connect(kp.clone()).transaction_hash(&tx))
            .collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_execute_requires_threshold() {
        let fx = fixture(2).await;
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();

        // Owner 0 signs and executes: one distinct signature
        fx.safe.sign_transaction(&mut tx).await.unwrap();
        let result = fx.safe.execute_transaction(&tx).await;
        assert!(matches!(
            result,
            Err(SafeError::InsufficientSignatures { have: 1, need: 2 })
        ));

        // Signing again does not add a second approval
        fx.safe.sign_transaction(&mut tx).await.unwrap();
        assert_eq!(tx.signature_count(), 1);

        fx.safe
            .connect(fx.owners[1].clone())
            .sign_transaction(&mut tx)
            .await
            .unwrap();
        let receipt = fx.safe.execute_transaction(&tx).await.unwrap();
        assert!(receipt.success);
        assert_eq!(fx.chain.balance(&recipient()).await.unwrap(), U256::from(10));
    }

    #[tokio::test]
    async fn test_non_owner_executor_needs_full_threshold() {
        let fx = fixture(2).await;
        let outsider = fx.safe.connect(KeyPair::generate());
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();
        fx.safe.sign_transaction(&mut tx).await.unwrap();

        assert!(matches!(
            outsider.execute_transaction(&tx).await,
            Err(SafeError::InsufficientSignatures { have: 1, need: 2 })
        ));

        fx.safe
            .connect(fx.owners[2].clone())
            .sign_transaction(&mut tx)
            .await
            .unwrap();
        assert!(outsider.execute_transaction(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_executor_approval_completes_threshold() {
        let fx = fixture(2).await;
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();
        fx.safe
            .connect(fx.owners[1].clone())
            .sign_transaction(&mut tx)
            .await
            .unwrap();

        // Owner 0 has not signed; executing adds its approval
        let receipt = fx.safe.execute_transaction(&tx).await.unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_outsider_cannot_sign() {
        let fx = fixture(1).await;
        let outsider = fx.safe.connect(KeyPair::generate());
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();
        assert!(matches!(
            outsider.sign_transaction(&mut tx).await,
            Err(SafeError::NotAnOwner(_))
        ));
    }

    #[tokio::test]
    async fn test_forged_signature_rejected() {
        let fx = fixture(2).await;
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();
        let hash = fx.safe.transaction_hash(&tx);

        // Owner 1's name on owner 2's signature
        let forged = fx.safe.connect(fx.owners[2].clone()).sign_transaction_hash(&hash).unwrap();
        tx.add_signature(SafeSignature::new(fx.owners[1].address(), forged.data));

        assert!(matches!(
            fx.safe.execute_transaction(&tx).await,
            Err(SafeError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_second_execution_fails() {
        let fx = fixture(1).await;
        let mut tx = fx
            .safe
            .create_transaction(SafeTransactionDataPartial::transfer(recipient(), U256::from(10)))
            .await
            .unwrap();
        fx.safe.sign_transaction(&mut tx).await.unwrap();
        fx.safe.execute_transaction(&tx).await.unwrap();

        assert!(matches!(
            fx.safe.execute_transaction(&tx).await,
            Err(SafeError::AlreadyExecuted { nonce: 0, current: 1 })
        ));
        assert_eq!(fx.chain.balance(&recipient()).await.unwrap(), U256::from(10));
    }
}
