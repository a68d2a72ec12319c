use super::{Safe, SafeError};
use crate::chain::ChainProvider;
use crate::crypto::KeyPair;
use crate::multisig::SafeAccountConfig;
use std::sync::Arc;

/// Deploys new multisig accounts
pub struct SafeFactory {
    provider: Arc<dyn ChainProvider>,
    deployer: KeyPair,
}

impl SafeFactory {
    pub fn new(provider: Arc<dyn ChainProvider>, deployer: KeyPair) -> Self {
        Self { provider, deployer }
    }

    /// Deploy an account for `config` and bind the deployer to it
    ///
    /// The configuration is validated before anything is sent, so a
    /// threshold outside `1..=owners` never reaches the chain.
    pub async fn deploy_safe(
        &self,
        config: SafeAccountConfig,
        salt_nonce: u64,
    ) -> Result<Safe, SafeError> {
        config.validate()?;

        let address = self
            .provider
            .deploy_safe(&self.deployer, &config, salt_nonce)
            .await?;
        log::info!(
            "Deployed {} account at {} (salt nonce {})",
            config.description(),
            address,
            salt_nonce
        );

        Safe::load(self.provider.clone(), self.deployer.clone(), address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LocalChain;
    use crate::core::Address;
    use crate::multisig::MultisigError;

    fn owners(n: usize) -> Vec<Address> {
        (0..n).map(|_| KeyPair::generate().address()).collect()
    }

    #[tokio::test]
    async fn test_deploy_accepts_threshold_within_owner_count() {
        let chain: Arc<dyn ChainProvider> = Arc::new(LocalChain::default());
        let factory = SafeFactory::new(chain, KeyPair::generate());
        let owner_set = owners(3);

        for (salt, threshold) in (1..=3).enumerate() {
            let config = SafeAccountConfig {
                owners: owner_set.clone(),
                threshold,
                fallback_handler: None,
            };
            let safe = factory.deploy_safe(config, salt as u64).await.unwrap();
            assert_eq!(safe.threshold().await.unwrap(), threshold);
            assert_eq!(safe.owners().await.unwrap(), owner_set);
            assert_eq!(safe.nonce().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_deploy_rejects_threshold_out_of_range() {
        let chain: Arc<dyn ChainProvider> = Arc::new(LocalChain::default());
        let factory = SafeFactory::new(chain, KeyPair::generate());

        for threshold in [0, 4] {
            let config = SafeAccountConfig {
                owners: owners(3),
                threshold,
                fallback_handler: None,
            };
            let result = factory.deploy_safe(config, 0).await;
            assert!(matches!(
                result,
                Err(SafeError::Config(MultisigError::InvalidThreshold(_)))
            ));
        }
    }

    #[tokio::test]
    async fn test_deployer_need_not_be_owner() {
        let chain: Arc<dyn ChainProvider> = Arc::new(LocalChain::default());
        let deployer = KeyPair::generate();
        let factory = SafeFactory::new(chain, deployer.clone());
        let config = SafeAccountConfig::new(owners(2), 1).unwrap();

        let safe = factory.deploy_safe(config, 7).await.unwrap();
        assert_eq!(safe.signer_address(), deployer.address());
        assert!(!safe.is_owner(&deployer.address()).await.unwrap());
    }
}
