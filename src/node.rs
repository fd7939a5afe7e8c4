//! Node connection collaborator
//!
//! A thin trait over the JSON-RPC node so the dispatcher and account
//! context can be exercised against a mock in tests. The production
//! implementation wraps an ethers HTTP provider.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

/// Read and broadcast operations against a JSON-RPC node.
///
/// Connectivity failures propagate as-is; nothing here retries.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain id as the node reports it
    async fn chain_id(&self) -> Result<u64>;

    /// Native balance of an address
    async fn balance_of(&self, address: Address) -> Result<U256>;

    /// Transaction count (nonce) of an address
    async fn transaction_count(&self, address: Address) -> Result<U256>;

    /// Execute a read-only call, no state change
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes>;

    /// Gas estimation for a call
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;

    /// Current gas price
    async fn gas_price(&self) -> Result<U256>;

    /// Receipt lookup, None while the transaction is pending
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<Value>>;

    /// Broadcast a signed raw transaction. The only state-changing call.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

    /// Verbatim passthrough for any method not modeled above
    async fn raw_request(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

/// Production node client over an ethers HTTP provider
pub struct HttpNodeClient {
    provider: Provider<Http>,
}

impl HttpNodeClient {
    /// A hung node must not stall a run: every request is bounded by
    /// `timeout`, same as the aggregator side.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let url = url::Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid node endpoint {}: {}", endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build node HTTP client: {}", e)))?;
        let provider = Provider::new(Http::new_with_client(url, client));

        Ok(Self { provider })
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chainid().await?.as_u64())
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_transaction_count(address, None).await?)
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes> {
        Ok(self.provider.call(tx, None).await?)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        Ok(self.provider.estimate_gas(tx, None).await?)
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<Value>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        match receipt {
            Some(receipt) => Ok(Some(serde_json::to_value(receipt)?)),
            None => Ok(None),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(pending.tx_hash())
    }

    async fn raw_request(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        Ok(self.provider.request::<_, Value>(method, params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_timeout() {
        let client = HttpNodeClient::new("http://127.0.0.1:8545", Duration::from_millis(100));
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let result = HttpNodeClient::new("not a url", Duration::from_millis(100));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
