//! HTTP client for the Safe Transaction Service

use super::types::*;
use super::{ServiceError, ServiceResult, TransactionService};
use crate::core::{Address, Bytes, B256};
use crate::network;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use url::Url;

/// Retry schedule for transient failures (connection errors, timeouts, 429, 5xx)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `1` disables retries
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each one after
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (starting at 1)
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }
}

/// Transaction service client over HTTP + JSON
#[derive(Clone, Debug)]
pub struct SafeApiClient {
    base_url: Url,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl SafeApiClient {
    /// Client for the service at `base_url` (e.g. `https://safe-transaction-mainnet.safe.global/api`)
    pub fn new(base_url: &str) -> ServiceResult<Self> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(base_url: &str, options: ClientOptions) -> ServiceResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            base_url,
            http,
            retry: options.retry,
        })
    }

    /// Client for the hosted service of a known chain
    pub fn for_chain(chain_id: u64) -> ServiceResult<Self> {
        let chain = network::chain_info(chain_id).ok_or(ServiceError::UnknownChain(chain_id))?;
        let url = chain.service_url().ok_or(ServiceError::UnknownChain(chain_id))?;
        Self::new(&url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ServiceResult<T> {
        self.send(|| self.http.get(url.clone())).await
    }

    /// Send with retries; `request` builds a fresh request per attempt
    async fn send<T, F>(&self, request: F) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match Self::send_once(request()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    log::warn!(
                        "Request failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(request: RequestBuilder) -> ServiceResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?;
        log::debug!("{} {} ({} bytes)", status, url.path(), body.len());

        if !status.is_success() {
            return Err(map_status(status, &url, &body));
        }

        // Created/No Content responses carry no body
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        Ok(serde_json::from_slice(body)?)
    }
}

fn map_status(status: StatusCode, url: &Url, body: &[u8]) -> ServiceError {
    let message = String::from_utf8_lossy(body).trim().to_string();
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(url.path().to_string()),
        StatusCode::CONFLICT => ServiceError::DuplicateProposal(message),
        StatusCode::UNPROCESSABLE_ENTITY if message.to_lowercase().contains("exist") => {
            ServiceError::DuplicateProposal(message)
        }
        _ => ServiceError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl TransactionService for SafeApiClient {
    async fn service_info(&self) -> ServiceResult<ServiceInfo> {
        self.get(self.endpoint("v1/about/")?).await
    }

    async fn singletons(&self) -> ServiceResult<Vec<SingletonInfo>> {
        self.get(self.endpoint("v1/about/singletons/")?).await
    }

    async fn safe_info(&self, safe: &Address) -> ServiceResult<SafeInfo> {
        self.get(self.endpoint(&format!("v1/safes/{}/", safe))?)
            .await
    }

    async fn safes_by_owner(&self, owner: &Address) -> ServiceResult<OwnerSafes> {
        self.get(self.endpoint(&format!("v1/owners/{}/safes/", owner))?)
            .await
    }

    async fn delegates(&self, safe: &Address) -> ServiceResult<Page<Delegate>> {
        let mut url = self.endpoint("v2/delegates/")?;
        url.query_pairs_mut().append_pair("safe", &safe.to_string());
        self.get(url).await
    }

    async fn propose_transaction(&self, props: ProposeTransactionProps) -> ServiceResult<()> {
        let url = self.endpoint(&format!(
            "v1/safes/{}/multisig-transactions/",
            props.safe_address
        ))?;
        let hash = props.safe_tx_hash;
        let body = ProposeTransactionBody::from(props);

        let attempts = AtomicU32::new(0);
        let result = self
            .send::<serde_json::Value, _>(|| {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.http.post(url.clone()).json(&body)
            })
            .await;
        match result {
            Ok(_) => log::info!("Proposed transaction {}", hash),
            // A failed attempt may have been stored before its response was lost
            Err(ServiceError::DuplicateProposal(_)) if attempts.load(Ordering::Relaxed) > 1 => {
                log::info!("Proposed transaction {} (stored by an earlier attempt)", hash)
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn pending_transactions(
        &self,
        safe: &Address,
    ) -> ServiceResult<Page<SafeMultisigTransaction>> {
        let nonce = self.safe_info(safe).await?.nonce;

        let mut url = self.endpoint(&format!("v1/safes/{}/multisig-transactions/", safe))?;
        url.query_pairs_mut()
            .append_pair("executed", "false")
            .append_pair("nonce__gte", &nonce.to_string())
            .append_pair("ordering", "submissionDate");
        self.get(url).await
    }

    async fn confirm_transaction(
        &self,
        safe_tx_hash: &B256,
        signature: &[u8],
    ) -> ServiceResult<SignatureResponse> {
        let url = self.endpoint(&format!(
            "v1/multisig-transactions/{}/confirmations/",
            safe_tx_hash
        ))?;
        let body = SignatureResponse {
            signature: Bytes::copy_from_slice(signature),
        };
        self.send(|| self.http.post(url.clone()).json(&body)).await
    }

    async fn get_transaction(
        &self,
        safe_tx_hash: &B256,
    ) -> ServiceResult<SafeMultisigTransaction> {
        self.get(self.endpoint(&format!("v1/multisig-transactions/{}/", safe_tx_hash))?)
            .await
    }
}
