//! JSON-RPC transport for contract reads (`eth_call`).

use crate::chain::rate_limit::RpcRateLimiter;
use crate::error::{GalleryError, Result};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::eth::request::{TransactionInput, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use alloy::transports::RpcError;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use std::future::IntoFuture;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument, warn};

/// Read-only client for one EVM JSON-RPC endpoint.
pub struct EvmRpcClient {
    url: String,
    provider: RootProvider,
    timeout: Duration,
    rate_limiter: RpcRateLimiter,
    retry_attempts: usize,
}

/// Why a single attempt failed; only transport errors are worth retrying.
enum CallFailure {
    Transport(String),
    Rejected(String),
}

impl EvmRpcClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        requests_per_second: u32,
        retry_attempts: usize,
    ) -> Result<Self> {
        let url = url.into();
        let endpoint: Url = url
            .parse()
            .map_err(|e| GalleryError::Config(format!("invalid RPC URL {}: {}", url, e)))?;

        Ok(Self {
            url,
            provider: RootProvider::new_http(endpoint),
            timeout,
            rate_limiter: RpcRateLimiter::new(requests_per_second, 50, 0.2),
            retry_attempts,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `eth_call` a view function on `contract` against the latest block and
    /// decode its return value.
    #[instrument(skip(self, call), fields(function = C::SIGNATURE))]
    pub async fn call<C: SolCall>(&self, contract: Address, call: C) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.retry_attempts);

        // Reverts are final; transport hiccups get the backoff schedule.
        let outcome = Retry::spawn(retry_strategy, || async {
            match self.call_once(contract, data.clone()).await {
                Err(CallFailure::Transport(reason)) => Err(reason),
                other => Ok(other),
            }
        })
        .await;

        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(CallFailure::Rejected(reason))) | Ok(Err(CallFailure::Transport(reason))) => {
                return Err(GalleryError::fetch(format!("{} reverted: {}", C::SIGNATURE, reason)))
            }
            Err(reason) => return Err(GalleryError::fetch(format!("{} failed: {}", C::SIGNATURE, reason))),
        };
        debug!("{} returned {} bytes", C::SIGNATURE, raw.len());

        C::abi_decode_returns(&raw)
            .map_err(|e| GalleryError::fetch(format!("{} returned undecodable data: {}", C::SIGNATURE, e)))
    }

    async fn call_once(&self, contract: Address, data: Bytes) -> std::result::Result<Bytes, CallFailure> {
        self.rate_limiter.acquire().await;

        let tx = TransactionRequest::default()
            .to(contract)
            .input(TransactionInput::new(data));

        match tokio::time::timeout(self.timeout, self.provider.call(tx).into_future()).await {
            Ok(Ok(raw)) => {
                self.rate_limiter.record_success();
                Ok(raw)
            }
            Ok(Err(RpcError::ErrorResp(payload))) => {
                // The node answered; the contract refused.
                self.rate_limiter.record_success();
                Err(CallFailure::Rejected(format!("{} (code {})", payload.message, payload.code)))
            }
            Ok(Err(e)) => {
                self.rate_limiter.record_failure();
                warn!("RPC request to {} failed: {}", self.url, e);
                Err(CallFailure::Transport(e.to_string()))
            }
            Err(_) => {
                self.rate_limiter.record_failure();
                warn!("RPC request to {} timed out after {:?}", self.url, self.timeout);
                Err(CallFailure::Transport(format!("timed out after {:?}", self.timeout)))
            }
        }
    }
}
