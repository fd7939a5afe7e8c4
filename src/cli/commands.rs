//! CLI command implementations

use anyhow::{Context, Result};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::account::{AccountContext, Credential};
use crate::aggregator::HttpAggregator;
use crate::config::Config;
use crate::node::{HttpNodeClient, NodeClient};
use crate::pipeline::{EntryParams, Pipeline};
use crate::provider::{provider_for, RpcRequest};
use crate::state::MemoryStateContainer;

/// Environment variable holding the signing credential. Never read from
/// the config file.
const PRIVATE_KEY_ENV: &str = "PAYLOADER_PRIVATE_KEY";

/// Generate a transaction payload for one vault operation.
///
/// This is the entry-point surface: vault id and type are required,
/// amount defaults to "all", and a wallet override re-binds the account
/// context to a read-only address before the run. The result is printed
/// as JSON whether the run succeeded or not.
pub async fn generate(
    config: &Config,
    vault: &str,
    operation: &str,
    amount: &str,
    wallet: Option<String>,
) -> Result<()> {
    let node = Arc::new(HttpNodeClient::new(
        &config.node.endpoint,
        Duration::from_millis(config.node.timeout_ms),
    )?);

    let mut context = AccountContext::new(load_credential(config)?)?;
    if let Some(raw) = &wallet {
        let address: Address = raw
            .parse()
            .with_context(|| format!("Invalid wallet override: {}", raw))?;
        info!("Re-binding account context to read-only address {:?}", address);
        context = context.rebind_read_only(address);
    }
    let context = Arc::new(context);

    // Exercise the injected provider the way any standardized-method
    // caller would; doubles as a node connectivity check.
    let provider = provider_for(context.clone(), node.clone());
    let chain_id = provider
        .request(RpcRequest::new("eth_chainId", vec![]))
        .await?;
    info!(
        "Provider bound to {:?} on chain {} (can sign: {})",
        provider.address(),
        chain_id,
        provider.can_sign()
    );

    let aggregator = HttpAggregator::new(
        &config.aggregator.base_url,
        Duration::from_millis(config.aggregator.timeout_ms),
    )?;
    let state = MemoryStateContainer::default();

    let pipeline = Pipeline::new(
        aggregator,
        state,
        context,
        config.aggregator.preferred_token.clone(),
        config.readiness.clone(),
    );

    let result = pipeline
        .run(EntryParams {
            vault_id: Some(vault.to_string()),
            operation: Some(operation.to_string()),
            amount: Some(amount.to_string()),
            wallet,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Show effective configuration with the signing credential masked
pub fn show_config(config: &Config) -> Result<()> {
    println!("Node:");
    println!("  endpoint: {}", config.node.endpoint);
    println!("  timeout_ms: {}", config.node.timeout_ms);
    println!("Aggregator:");
    println!("  base_url: {}", config.aggregator.base_url);
    println!("  timeout_ms: {}", config.aggregator.timeout_ms);
    println!("  preferred_token: {}", config.aggregator.preferred_token);
    println!("Readiness:");
    println!("  minimum_options: {}", config.readiness.minimum_options);
    println!("  max_attempts: {}", config.readiness.max_attempts);
    println!("  interval_ms: {}", config.readiness.interval_ms);
    println!("Wallet:");
    println!(
        "  address: {}",
        config.wallet.address.as_deref().unwrap_or("(none)")
    );
    println!(
        "  private key: {}",
        if has_private_key() { "***set***" } else { "(not set)" }
    );
    Ok(())
}

/// Check node and aggregator reachability
pub async fn health(config: &Config) -> Result<()> {
    let node = HttpNodeClient::new(
        &config.node.endpoint,
        Duration::from_millis(config.node.timeout_ms),
    )?;
    match node.chain_id().await {
        Ok(chain_id) => info!("Node OK: chain id {}", chain_id),
        Err(e) => warn!("Node unreachable: {}", e),
    }

    let aggregator = HttpAggregator::new(
        &config.aggregator.base_url,
        Duration::from_millis(config.aggregator.timeout_ms),
    )?;
    match aggregator.health_check().await {
        Ok(()) => info!("Aggregator OK"),
        Err(e) => warn!("Aggregator unreachable: {}", e),
    }

    Ok(())
}

fn has_private_key() -> bool {
    std::env::var(PRIVATE_KEY_ENV)
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

fn load_credential(config: &Config) -> Result<Credential> {
    if let Ok(key) = std::env::var(PRIVATE_KEY_ENV) {
        if !key.is_empty() {
            return Ok(Credential::PrivateKey(key));
        }
    }

    match &config.wallet.address {
        Some(raw) => {
            let address: Address = raw
                .parse()
                .with_context(|| format!("Invalid wallet.address: {}", raw))?;
            Ok(Credential::Address(address))
        }
        None => {
            warn!("No credential configured, using the zero address read-only");
            Ok(Credential::Address(Address::zero()))
        }
    }
}
