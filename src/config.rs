//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub aggregator: AggregatorConfig,
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// HTTP JSON-RPC endpoint of the node
    #[serde(default = "default_node_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_node_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Base URL of the quoting/aggregation API
    #[serde(default = "default_aggregator_url")]
    pub base_url: String,

    #[serde(default = "default_aggregator_timeout_ms")]
    pub timeout_ms: u64,

    /// Stable reference asset preferred by option selection
    #[serde(default = "default_preferred_token")]
    pub preferred_token: String,
}

/// Bounded-wait parameters for the readiness poller
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Minimum number of populated options considered "ready"
    #[serde(default = "default_minimum_options")]
    pub minimum_options: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WalletConfig {
    /// Read-only account address. Ignored when PAYLOADER_PRIVATE_KEY
    /// is set; the signing credential never lives in the config file.
    pub address: Option<String>,
}

fn default_node_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_node_timeout_ms() -> u64 {
    30_000
}

fn default_aggregator_url() -> String {
    "https://aggregator.vaultcraft.io".to_string()
}

fn default_aggregator_timeout_ms() -> u64 {
    10_000
}

fn default_preferred_token() -> String {
    "USDC".to_string()
}

fn default_minimum_options() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("node.endpoint", default_node_endpoint())?
            .set_default("node.timeout_ms", default_node_timeout_ms() as i64)?
            .set_default("aggregator.base_url", default_aggregator_url())?
            .set_default(
                "aggregator.timeout_ms",
                default_aggregator_timeout_ms() as i64,
            )?
            .set_default("aggregator.preferred_token", default_preferred_token())?
            .set_default("readiness.minimum_options", default_minimum_options() as i64)?
            .set_default("readiness.max_attempts", default_max_attempts() as i64)?
            .set_default("readiness.interval_ms", default_interval_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix PAYLOADER_)
            .add_source(
                config::Environment::with_prefix("PAYLOADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.node.endpoint.is_empty() {
            anyhow::bail!("node.endpoint must not be empty");
        }

        if self.node.timeout_ms == 0 {
            anyhow::bail!("node.timeout_ms must be positive");
        }

        if self.aggregator.base_url.is_empty() {
            anyhow::bail!("aggregator.base_url must not be empty");
        }

        if self.aggregator.preferred_token.is_empty() {
            anyhow::bail!("aggregator.preferred_token must not be empty");
        }

        if self.readiness.max_attempts == 0 {
            anyhow::bail!("readiness.max_attempts must be at least 1");
        }

        if self.readiness.interval_ms == 0 {
            anyhow::bail!("readiness.interval_ms must be positive");
        }

        Ok(())
    }
}
