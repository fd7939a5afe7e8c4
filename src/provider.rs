//! RPC method dispatcher - the injected headless provider
//!
//! Emulates a browser wallet's request/response protocol against a remote
//! node and a known account, so code written against the standardized
//! wallet interface works unmodified without an interactive signer.
//!
//! Dispatch is a tagged method table behind one trait. Read-only and
//! signing contexts are distinct implementations of the same contract,
//! not one object with a nullable signer checked ad hoc.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, H256};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::account::AccountContext;
use crate::error::{Error, Result};
use crate::node::NodeClient;

/// A single standardized method request. Never mutated, no batching.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// The standardized wallet interface exposed to callers.
///
/// Event subscription hooks exist on the surface but are no-ops: this
/// emulated provider never emits async notifications.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn address(&self) -> Address;

    fn can_sign(&self) -> bool;

    async fn request(&self, request: RpcRequest) -> Result<Value>;

    fn on_event(&self, _event: &str) {}

    fn remove_listener(&self, _event: &str) {}
}

/// Pick the provider implementation matching the context's capability
pub fn provider_for<N: NodeClient + 'static>(
    context: Arc<AccountContext>,
    node: Arc<N>,
) -> Box<dyn WalletProvider> {
    match context.signer() {
        Some(signer) => {
            let signer = signer.clone();
            Box::new(SigningProvider {
                node,
                context,
                signer,
            })
        }
        None => Box::new(ReadOnlyProvider { node, context }),
    }
}

/// Provider over a bare address. Every write attempt fails with
/// `SigningUnavailable` before any node interaction.
pub struct ReadOnlyProvider<N: NodeClient> {
    node: Arc<N>,
    context: Arc<AccountContext>,
}

impl<N: NodeClient> ReadOnlyProvider<N> {
    pub fn new(context: Arc<AccountContext>, node: Arc<N>) -> Self {
        Self { node, context }
    }
}

#[async_trait]
impl<N: NodeClient> WalletProvider for ReadOnlyProvider<N> {
    fn address(&self) -> Address {
        self.context.address()
    }

    fn can_sign(&self) -> bool {
        false
    }

    async fn request(&self, request: RpcRequest) -> Result<Value> {
        match request.method.as_str() {
            "eth_sendTransaction" => Err(Error::SigningUnavailable),
            _ => dispatch_read(self.node.as_ref(), &self.context, &request).await,
        }
    }
}

/// Provider over a signing credential. Adds the value-transfer method:
/// construct, sign locally, broadcast.
pub struct SigningProvider<N: NodeClient> {
    node: Arc<N>,
    context: Arc<AccountContext>,
    signer: LocalWallet,
}

impl<N: NodeClient> SigningProvider<N> {
    pub fn new(context: Arc<AccountContext>, node: Arc<N>, signer: LocalWallet) -> Self {
        Self {
            node,
            context,
            signer,
        }
    }

    async fn send_transaction(&self, params: &[Value]) -> Result<Value> {
        let mut tx: TransactionRequest = serde_json::from_value(first_param(params)?.clone())
            .map_err(|e| Error::InvalidInput(format!("Malformed transaction object: {}", e)))?;

        let chain_id = self.context.chain_id(self.node.as_ref()).await?;
        tx.from = Some(self.context.address());

        if tx.nonce.is_none() {
            tx.nonce = Some(
                self.node
                    .transaction_count(self.context.address())
                    .await?,
            );
        }
        if tx.gas_price.is_none() {
            tx.gas_price = Some(self.node.gas_price().await?);
        }

        let mut typed = TypedTransaction::Legacy(tx);
        typed.set_chain_id(chain_id);
        if typed.gas().is_none() {
            let gas = self.node.estimate_gas(&typed).await?;
            typed.set_gas(gas);
        }

        let signer = self.signer.clone().with_chain_id(chain_id);
        let signature = signer.sign_transaction(&typed).await?;
        let raw = typed.rlp_signed(&signature);

        let hash = self.node.send_raw_transaction(raw).await?;
        debug!("Broadcast transaction {:?}", hash);

        Ok(json!(format!("{:?}", hash)))
    }
}

#[async_trait]
impl<N: NodeClient> WalletProvider for SigningProvider<N> {
    fn address(&self) -> Address {
        self.context.address()
    }

    fn can_sign(&self) -> bool {
        true
    }

    async fn request(&self, request: RpcRequest) -> Result<Value> {
        match request.method.as_str() {
            "eth_sendTransaction" => self.send_transaction(&request.params).await,
            _ => dispatch_read(self.node.as_ref(), &self.context, &request).await,
        }
    }
}

/// The read-side method table, shared by both implementations.
///
/// Everything here is a pure read against the node; unknown methods are
/// forwarded verbatim as a passthrough RPC call.
async fn dispatch_read(
    node: &dyn NodeClient,
    context: &AccountContext,
    request: &RpcRequest,
) -> Result<Value> {
    match request.method.as_str() {
        "eth_accounts" | "eth_requestAccounts" => {
            Ok(json!([format!("{:?}", context.address())]))
        }
        "eth_chainId" => Ok(json!(context.chain_id_hex(node).await?)),
        "eth_estimateGas" => {
            let tx = parse_transaction(&request.params)?;
            let gas = node.estimate_gas(&tx).await?;
            Ok(json!(format!("0x{:x}", gas)))
        }
        "eth_call" => {
            let tx = parse_transaction(&request.params)?;
            let output = node.call(&tx).await?;
            Ok(serde_json::to_value(output)?)
        }
        "eth_getBalance" => {
            let address = parse_address(first_param(&request.params)?)?;
            let balance = node.balance_of(address).await?;
            // Decimal string, matching the interface the downstream
            // consumers were written against
            Ok(json!(balance.to_string()))
        }
        "eth_getTransactionReceipt" => {
            let hash = parse_hash(first_param(&request.params)?)?;
            match node.transaction_receipt(hash).await? {
                Some(receipt) => Ok(receipt),
                None => Ok(Value::Null),
            }
        }
        "eth_gasPrice" => {
            let price = node.gas_price().await?;
            Ok(json!(format!("0x{:x}", price)))
        }
        other => {
            debug!("Passthrough RPC method: {}", other);
            node.raw_request(other, request.params.clone()).await
        }
    }
}

fn first_param(params: &[Value]) -> Result<&Value> {
    params
        .first()
        .ok_or_else(|| Error::InvalidInput("Missing request parameter".to_string()))
}

fn parse_address(value: &Value) -> Result<Address> {
    value
        .as_str()
        .ok_or_else(|| Error::InvalidInput("Address parameter must be a string".to_string()))?
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid address: {}", e)))
}

fn parse_hash(value: &Value) -> Result<H256> {
    value
        .as_str()
        .ok_or_else(|| Error::InvalidInput("Hash parameter must be a string".to_string()))?
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid transaction hash: {}", e)))
}

fn parse_transaction(params: &[Value]) -> Result<TypedTransaction> {
    let tx: TransactionRequest = serde_json::from_value(first_param(params)?.clone())
        .map_err(|e| Error::InvalidInput(format!("Malformed call object: {}", e)))?;
    Ok(TypedTransaction::Legacy(tx))
}
