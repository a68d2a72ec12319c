//! In-process transaction relay
//!
//! Keeps proposals and their confirmations in memory, validating each
//! submission against the account state read from a [`ChainProvider`].
//! Appends to a proposal happen under the write lock, so concurrent
//! confirmations of the same proposal are applied one at a time.

use super::types::*;
use super::{ServiceError, ServiceResult, TransactionService};
use crate::chain::{ChainError, ChainProvider};
use crate::core::{Address, Bytes, B256};
use crate::crypto::{recover_signer, safe_tx_hash};
use crate::multisig::{SafeSignature, SafeState};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredProposal {
    /// Insertion order, breaks ties between equal submission dates
    seq: u64,
    tx: SafeMultisigTransaction,
}

#[derive(Debug, Default)]
struct ServiceState {
    proposals: HashMap<B256, StoredProposal>,
    safes: BTreeSet<Address>,
    next_seq: u64,
}

/// Transaction service backed by memory and a chain provider
pub struct InMemoryService {
    provider: Arc<dyn ChainProvider>,
    state: RwLock<ServiceState>,
}

impl InMemoryService {
    pub fn new(provider: Arc<dyn ChainProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(ServiceState::default()),
        }
    }

    /// Index an account so owner lookups can find it
    pub async fn track_safe(&self, safe: Address) {
        self.state.write().await.safes.insert(safe);
    }

    pub async fn proposal_count(&self) -> usize {
        self.state.read().await.proposals.len()
    }

    async fn safe_state(&self, safe: &Address) -> ServiceResult<SafeState> {
        match self.provider.safe_state(safe).await {
            Ok(state) => Ok(state),
            Err(ChainError::NotASafe(address)) => {
                Err(ServiceError::NotFound(format!("safe {}", address)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fill in execution details from the chain
    async fn with_execution(
        &self,
        mut tx: SafeMultisigTransaction,
    ) -> ServiceResult<SafeMultisigTransaction> {
        if let Some(receipt) = self.provider.execution(&tx.safe, &tx.safe_tx_hash).await? {
            tx.is_executed = true;
            tx.is_successful = Some(receipt.success);
            tx.transaction_hash = Some(receipt.transaction_hash);
            tx.block_number = Some(receipt.block_number);
            tx.executor = Some(receipt.from);
            tx.execution_date.get_or_insert_with(Utc::now);
        }
        Ok(tx)
    }
}

fn signature_type(signature: &[u8]) -> &'static str {
    match signature.last() {
        Some(0) => "CONTRACT_SIGNATURE",
        Some(1) => "APPROVED_HASH",
        Some(v) if *v > 30 => "ETH_SIGN",
        _ => "EOA",
    }
}

#[async_trait]
impl TransactionService for InMemoryService {
    async fn service_info(&self) -> ServiceResult<ServiceInfo> {
        Ok(ServiceInfo {
            name: "In-memory Transaction Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: "v1".to_string(),
            secure: false,
            host: "localhost".to_string(),
            headers: Vec::new(),
            settings: serde_json::json!({ "chainId": self.provider.chain_id() }),
        })
    }

    async fn singletons(&self) -> ServiceResult<Vec<SingletonInfo>> {
        Ok(Vec::new())
    }

    async fn safe_info(&self, safe: &Address) -> ServiceResult<SafeInfo> {
        let state = self.safe_state(safe).await?;
        Ok(SafeInfo {
            address: *safe,
            nonce: state.nonce,
            threshold: state.threshold,
            owners: state.owners,
            master_copy: None,
            modules: Vec::new(),
            fallback_handler: state.fallback_handler,
            guard: None,
            version: Some(state.version),
        })
    }

    async fn safes_by_owner(&self, owner: &Address) -> ServiceResult<OwnerSafes> {
        let candidates: Vec<Address> = self.state.read().await.safes.iter().copied().collect();

        let mut safes = Vec::new();
        for safe in candidates {
            if self.safe_state(&safe).await?.is_owner(owner) {
                safes.push(safe);
            }
        }
        Ok(OwnerSafes { safes })
    }

    /// Delegation is not modelled locally; known accounts have none
    async fn delegates(&self, safe: &Address) -> ServiceResult<Page<Delegate>> {
        self.safe_state(safe).await?;
        Ok(Page::single(Vec::new()))
    }

    async fn propose_transaction(&self, props: ProposeTransactionProps) -> ServiceResult<()> {
        let safe = props.safe_address;
        let account = self.safe_state(&safe).await?;
        let data = props.safe_transaction_data;

        let expected = safe_tx_hash(self.provider.chain_id(), &safe, account.version, &data);
        if expected != props.safe_tx_hash {
            return Err(ServiceError::InvalidProposal(format!(
                "safeTxHash {} does not match transaction data ({})",
                props.safe_tx_hash, expected
            )));
        }

        if data.nonce < account.nonce {
            return Err(ServiceError::InvalidProposal(format!(
                "nonce {} already used (current nonce {})",
                data.nonce, account.nonce
            )));
        }

        // The proposer must prove key ownership; approved-hash markers prove nothing
        let sender = props.sender_address;
        let signature = SafeSignature::new(sender, props.sender_signature);
        if !signature.is_ecdsa() {
            return Err(ServiceError::InvalidSignature(sender));
        }
        let signer = recover_signer(&expected, &signature.data)
            .map_err(|_| ServiceError::InvalidSignature(sender))?;
        if signer != sender {
            return Err(ServiceError::InvalidSignature(sender));
        }
        if !account.is_owner(&sender) {
            return Err(ServiceError::NotAnOwner(sender));
        }

        let mut state = self.state.write().await;
        if state.proposals.contains_key(&expected) {
            return Err(ServiceError::DuplicateProposal(expected.to_string()));
        }

        let now = Utc::now();
        let tx = SafeMultisigTransaction {
            safe,
            to: data.to,
            value: data.value,
            data: data.data,
            operation: data.operation,
            gas_token: data.gas_token,
            safe_tx_gas: data.safe_tx_gas,
            base_gas: data.base_gas,
            gas_price: data.gas_price,
            refund_receiver: data.refund_receiver,
            nonce: data.nonce,
            execution_date: None,
            submission_date: now,
            modified: Some(now),
            block_number: None,
            transaction_hash: None,
            safe_tx_hash: expected,
            proposer: Some(sender),
            executor: None,
            is_executed: false,
            is_successful: None,
            origin: props.origin,
            confirmations_required: account.threshold,
            confirmations: vec![SafeMultisigConfirmation {
                owner: sender,
                submission_date: now,
                transaction_hash: None,
                signature_type: signature_type(&signature.data).to_string(),
                signature: signature.data,
            }],
            trusted: true,
        };

        let seq = state.next_seq;
        state.next_seq += 1;
        state.proposals.insert(expected, StoredProposal { seq, tx });
        state.safes.insert(safe);

        log::info!("Stored proposal {} for {} (nonce {})", expected, safe, data.nonce);
        Ok(())
    }

    async fn pending_transactions(
        &self,
        safe: &Address,
    ) -> ServiceResult<Page<SafeMultisigTransaction>> {
        let nonce = self.safe_state(safe).await?.nonce;

        let mut candidates: Vec<StoredProposal> = self
            .state
            .read()
            .await
            .proposals
            .values()
            .filter(|p| p.tx.safe == *safe && p.tx.nonce >= nonce)
            .cloned()
            .collect();
        candidates.sort_by_key(|p| (p.tx.submission_date, p.seq));

        let mut pending = Vec::with_capacity(candidates.len());
        for proposal in candidates {
            let tx = self.with_execution(proposal.tx).await?;
            if !tx.is_executed {
                pending.push(tx);
            }
        }
        Ok(Page::single(pending))
    }

    async fn confirm_transaction(
        &self,
        safe_tx_hash: &B256,
        signature: &[u8],
    ) -> ServiceResult<SignatureResponse> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(safe_tx_hash)
            .ok_or_else(|| ServiceError::NotFound(format!("transaction {}", safe_tx_hash)))?;

        let safe = proposal.tx.safe;
        if self.provider.execution(&safe, safe_tx_hash).await?.is_some() {
            return Err(ServiceError::InvalidProposal(format!(
                "transaction {} already executed",
                safe_tx_hash
            )));
        }

        // Only ECDSA signatures identify an owner here
        let owner = recover_signer(safe_tx_hash, signature)?;
        let account = self.safe_state(&safe).await?;
        if !account.is_owner(&owner) {
            return Err(ServiceError::NotAnOwner(owner));
        }

        if let Some(existing) = proposal.tx.confirmations.iter().find(|c| c.owner == owner) {
            log::debug!("{} already confirmed {}", owner, safe_tx_hash);
            return Ok(SignatureResponse {
                signature: existing.signature.clone(),
            });
        }

        let now = Utc::now();
        proposal.tx.confirmations.push(SafeMultisigConfirmation {
            owner,
            submission_date: now,
            transaction_hash: None,
            signature: Bytes::copy_from_slice(signature),
            signature_type: signature_type(signature).to_string(),
        });
        proposal.tx.modified = Some(now);

        log::info!(
            "{} confirmed {} ({}/{})",
            owner,
            safe_tx_hash,
            proposal.tx.confirmations.len(),
            proposal.tx.confirmations_required
        );
        Ok(SignatureResponse {
            signature: Bytes::copy_from_slice(signature),
        })
    }

    async fn get_transaction(
        &self,
        safe_tx_hash: &B256,
    ) -> ServiceResult<SafeMultisigTransaction> {
        let tx = self
            .state
            .read()
            .await
            .proposals
            .get(safe_tx_hash)
            .map(|p| p.tx.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("transaction {}", safe_tx_hash)))?;
        self.with_execution(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LocalChain;
    use crate::core::U256;
    use crate::crypto::{KeyError, KeyPair};
    use crate::multisig::{SafeAccountConfig, SafeTransactionDataPartial};
    use crate::sdk::{Safe, SafeFactory};

    struct Fixture {
        service: InMemoryService,
        owners: Vec<KeyPair>,
        safe: Safe,
    }

    async fn fixture() -> Fixture {
        let chain = Arc::new(LocalChain::default());
        let owners: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let config = SafeAccountConfig::new(owners.iter().map(|k| k.address()).collect(), 2)
            .unwrap()
            .with_fallback_handler(fallback_handler());
        let safe = SafeFactory::new(chain.clone(), owners[0].clone())
            .deploy_safe(config, 0)
            .await
            .unwrap();
        chain.fund(&safe.address(), U256::from(1_000)).await;

        Fixture {
            service: InMemoryService::new(chain),
            owners,
            safe,
        }
    }

    fn recipient() -> Address {
        "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap()
    }

    fn fallback_handler() -> Address {
        "0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4".parse().unwrap()
    }

    async fn proposal(safe: &Safe, value: u64) -> ProposeTransactionProps {
        let tx = safe
            .create_transaction(SafeTransactionDataPartial::transfer(
                recipient(),
                U256::from(value),
            ))
            .await
            .unwrap();
        let hash = safe.transaction_hash(&tx);
        let signature = safe.sign_transaction_hash(&hash).unwrap();
        ProposeTransactionProps {
            safe_address: safe.address(),
            safe_transaction_data: tx.data,
            safe_tx_hash: hash,
            sender_address: safe.signer_address(),
            sender_signature: signature.data,
            origin: None,
        }
    }

    /// Propose as owner 0, returning the stored hash
    async fn proposed(fx: &Fixture) -> B256 {
        let props = proposal(&fx.safe, 10).await;
        let hash = props.safe_tx_hash;
        fx.service.propose_transaction(props).await.unwrap();
        hash
    }

    fn signature_of(fx: &Fixture, owner: usize, hash: &B256) -> Bytes {
        fx.safe
            .connect(fx.owners[owner].clone())
            .sign_transaction_hash(hash)
            .unwrap()
            .data
    }

    #[tokio::test]
    async fn test_propose_and_fetch() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;

        let stored = fx.service.get_transaction(&hash).await.unwrap();
        assert_eq!(stored.value, U256::from(10));
        assert_eq!(stored.confirmations_required, 2);
        assert_eq!(stored.confirmations.len(), 1);
        assert_eq!(stored.confirmations[0].signature_type, "ETH_SIGN");
        assert!(!stored.is_executed);
    }

    #[tokio::test]
    async fn test_duplicate_proposal_leaves_existing_untouched() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;
        let before = fx.service.get_transaction(&hash).await.unwrap();

        // Same transaction proposed by another owner
        let other = fx.safe.connect(fx.owners[1].clone());
        let props = proposal(&other, 10).await;
        assert_eq!(props.safe_tx_hash, hash);
        let result = fx.service.propose_transaction(props).await;
        assert!(matches!(result, Err(ServiceError::DuplicateProposal(_))));

        let after = fx.service.get_transaction(&hash).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(fx.service.proposal_count().await, 1);
    }

    #[tokio::test]
    async fn test_pre_validated_proposer_signature_rejected() {
        let fx = fixture().await;
        let mut props = proposal(&fx.safe, 10).await;
        props.sender_signature = SafeSignature::pre_validated(props.sender_address).data;

        let result = fx.service.propose_transaction(props).await;
        assert!(matches!(result, Err(ServiceError::InvalidSignature(_))));
        assert_eq!(fx.service.proposal_count().await, 0);
    }

    #[tokio::test]
    async fn test_contract_marker_proposer_signature_rejected() {
        let fx = fixture().await;
        let mut props = proposal(&fx.safe, 10).await;
        let mut data = props.sender_signature.to_vec();
        data[64] = 0;
        props.sender_signature = Bytes::from(data);

        let result = fx.service.propose_transaction(props).await;
        assert!(matches!(result, Err(ServiceError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent_per_owner() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;

        let signature = signature_of(&fx, 1, &hash);
        fx.service.confirm_transaction(&hash, &signature).await.unwrap();
        let once = fx.service.get_transaction(&hash).await.unwrap();

        let response = fx
            .service
            .confirm_transaction(&hash, &signature)
            .await
            .unwrap();
        assert_eq!(response.signature, signature);

        let twice = fx.service.get_transaction(&hash).await.unwrap();
        assert_eq!(once.confirmations, twice.confirmations);
        assert_eq!(twice.confirmations.len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_unknown_hash() {
        let fx = fixture().await;
        let hash = B256::repeat_byte(0x42);
        let signature = signature_of(&fx, 1, &hash);

        assert!(matches!(
            fx.service.confirm_transaction(&hash, &signature).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_rejects_malformed_signature() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;

        assert!(matches!(
            fx.service.confirm_transaction(&hash, &[0u8; 10]).await,
            Err(ServiceError::Key(KeyError::InvalidSignatureLength(10)))
        ));
        assert!(matches!(
            fx.service.confirm_transaction(&hash, &[0x55u8; 65]).await,
            Err(ServiceError::Key(_))
        ));
        assert_eq!(
            fx.service.get_transaction(&hash).await.unwrap().confirmations.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_confirm_rejects_marker_signatures() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;

        // An otherwise valid signature with v rewritten to the contract marker
        let mut contract = signature_of(&fx, 1, &hash).to_vec();
        contract[64] = 0;
        assert!(matches!(
            fx.service.confirm_transaction(&hash, &contract).await,
            Err(ServiceError::Key(KeyError::UnsupportedSignatureType(0)))
        ));

        let approved = SafeSignature::pre_validated(fx.owners[1].address());
        assert!(matches!(
            fx.service.confirm_transaction(&hash, &approved.data).await,
            Err(ServiceError::Key(KeyError::UnsupportedSignatureType(1)))
        ));

        let stored = fx.service.get_transaction(&hash).await.unwrap();
        assert_eq!(stored.confirmations.len(), 1);

        // The proposal is still executable once a real confirmation arrives
        let signature = signature_of(&fx, 1, &hash);
        fx.service.confirm_transaction(&hash, &signature).await.unwrap();
        let tx = fx.service.get_transaction(&hash).await.unwrap();
        let receipt = fx
            .safe
            .execute_transaction(&tx.to_safe_transaction())
            .await
            .unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_confirm_after_execution() {
        let fx = fixture().await;
        let hash = proposed(&fx).await;

        let signature = signature_of(&fx, 1, &hash);
        fx.service.confirm_transaction(&hash, &signature).await.unwrap();
        let tx = fx.service.get_transaction(&hash).await.unwrap();
        fx.safe
            .execute_transaction(&tx.to_safe_transaction())
            .await
            .unwrap();

        let late = signature_of(&fx, 2, &hash);
        assert!(matches!(
            fx.service.confirm_transaction(&hash, &late).await,
            Err(ServiceError::InvalidProposal(_))
        ));
        let stored = fx.service.get_transaction(&hash).await.unwrap();
        assert!(stored.is_executed);
        assert_eq!(stored.confirmations.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_mismatched_hash() {
        let fx = fixture().await;
        let mut props = proposal(&fx.safe, 10).await;
        props.safe_transaction_data.value = U256::from(11);

        let result = fx.service.propose_transaction(props).await;
        assert!(matches!(result, Err(ServiceError::InvalidProposal(_))));
        assert_eq!(fx.service.proposal_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_outsiders() {
        let fx = fixture().await;
        let outsider = fx.safe.connect(KeyPair::generate());

        let result = fx
            .service
            .propose_transaction(proposal(&outsider, 10).await)
            .await;
        assert!(matches!(result, Err(ServiceError::NotAnOwner(_))));

        let hash = proposed(&fx).await;
        let signature = outsider.sign_transaction_hash(&hash).unwrap();
        assert!(matches!(
            fx.service.confirm_transaction(&hash, &signature.data).await,
            Err(ServiceError::NotAnOwner(_))
        ));
    }

    #[tokio::test]
    async fn test_sender_must_match_signature() {
        let fx = fixture().await;
        let mut props = proposal(&fx.safe, 10).await;
        props.sender_address = fx.owners[1].address();

        let result = fx.service.propose_transaction(props).await;
        assert!(matches!(result, Err(ServiceError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_pending_excludes_executed() {
        let fx = fixture().await;
        let first_hash = proposed(&fx).await;

        let replacement = proposal(&fx.safe, 20).await;
        fx.service.propose_transaction(replacement).await.unwrap();

        let pending = fx.service.pending_transactions(&fx.safe.address()).await.unwrap();
        assert_eq!(pending.count, 2);
        assert_eq!(pending.results[0].safe_tx_hash, first_hash);

        let signature = signature_of(&fx, 2, &first_hash);
        fx.service
            .confirm_transaction(&first_hash, &signature)
            .await
            .unwrap();
        let tx = fx.service.get_transaction(&first_hash).await.unwrap();
        fx.safe
            .execute_transaction(&tx.to_safe_transaction())
            .await
            .unwrap();

        // Both shared nonce 0; neither is pending once the nonce moved on
        let pending = fx.service.pending_transactions(&fx.safe.address()).await.unwrap();
        assert!(pending.results.is_empty());

        let executed = fx.service.get_transaction(&first_hash).await.unwrap();
        assert!(executed.is_executed);
        assert_eq!(executed.is_successful, Some(true));
        assert_eq!(executed.executor, Some(fx.owners[0].address()));
    }

    #[tokio::test]
    async fn test_metadata_queries() {
        let fx = fixture().await;
        let owner = fx.owners[2].address();

        let info = fx.service.safe_info(&fx.safe.address()).await.unwrap();
        assert_eq!(info.threshold, 2);
        assert!(info.owners.contains(&owner));
        assert_eq!(info.fallback_handler, Some(fallback_handler()));

        assert!(fx.service.safes_by_owner(&owner).await.unwrap().safes.is_empty());
        fx.service.track_safe(fx.safe.address()).await;
        assert_eq!(
            fx.service.safes_by_owner(&owner).await.unwrap().safes,
            vec![fx.safe.address()]
        );

        assert!(matches!(
            fx.service.safe_info(&recipient()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(fx.service.singletons().await.unwrap().is_empty());
        assert_eq!(
            fx.service.delegates(&fx.safe.address()).await.unwrap().count,
            0
        );
        assert!(matches!(
            fx.service.delegates(&recipient()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
