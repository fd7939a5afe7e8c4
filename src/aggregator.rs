// Aggregator/quoting API client - external collaborator for vault routes
use async_trait::async_trait;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::state::StateSnapshot;

/// Token reference as the aggregator reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
    pub address: String,
    pub symbol: String,
}

/// Candidate route for moving funds into or out of a vault.
///
/// Deposits carry an ordered sequence of input tokens, withdraws an
/// ordered sequence of wanted-output tokens. Selected, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultOption {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "inputTokens", default)]
    pub input_tokens: Vec<TokenRef>,
    #[serde(rename = "wantedTokens", default)]
    pub wanted_tokens: Vec<TokenRef>,
}

/// Amount requested for one token of a chosen option.
///
/// `is_max = true` is the canonical way to express "full withdraw";
/// the amount still has to be non-zero because the aggregator rejects
/// a literal zero even when the max flag is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountSpec {
    pub token: TokenRef,
    pub amount: String,
    #[serde(rename = "isMax")]
    pub is_max: bool,
}

/// Priced/routed instantiation of a chosen option. Opaque to this core
/// beyond being passed forward; the aggregator pre-orders by its own
/// preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quote(pub Value);

impl Quote {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }
}

/// Action resolved through the state container's dispatch mechanism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchableAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

/// Unit of work whose dispatch yields the final transaction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub action: DispatchableAction,
}

/// The quoting/aggregation collaborator.
///
/// All calls are asynchronous, may return empty sequences, and are
/// idempotent and side-effect-free; only the returned step's action is
/// state-changing, and that is dispatched elsewhere.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn deposit_options(
        &self,
        vault_id: &str,
        state: &StateSnapshot,
    ) -> Result<Vec<VaultOption>>;

    async fn withdraw_options(
        &self,
        vault_id: &str,
        state: &StateSnapshot,
    ) -> Result<Vec<VaultOption>>;

    async fn deposit_quotes(
        &self,
        option: &VaultOption,
        amounts: &[AmountSpec],
        state: &StateSnapshot,
    ) -> Result<Vec<Quote>>;

    async fn withdraw_quotes(
        &self,
        option: &VaultOption,
        amounts: &[AmountSpec],
        state: &StateSnapshot,
    ) -> Result<Vec<Quote>>;

    async fn deposit_step(
        &self,
        quote: &Quote,
        state: &StateSnapshot,
        account: Address,
    ) -> Result<ExecutionStep>;

    async fn withdraw_step(
        &self,
        quote: &Quote,
        state: &StateSnapshot,
        account: Address,
    ) -> Result<ExecutionStep>;
}

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    options: Option<Vec<VaultOption>>,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Option<Vec<Quote>>,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    step: Option<ExecutionStep>,
}

#[derive(Debug, Serialize)]
struct QuoteRequestBody<'a> {
    option: &'a VaultOption,
    amounts: &'a [AmountSpec],
}

#[derive(Debug, Serialize)]
struct StepRequestBody<'a> {
    quote: &'a Quote,
    account: String,
}

/// HTTP client for the aggregator API
pub struct HttpAggregator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAggregator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = url::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid aggregator base URL {}: {}", base_url, e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Reachability probe for the health command
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Aggregator health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch_options(&self, url: String) -> Result<Vec<VaultOption>> {
        debug!("Fetching options from {}", url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Aggregator returned {} for {}",
                response.status(),
                url
            )));
        }

        let body: OptionsResponse = response.json().await?;
        let options = body.options.unwrap_or_else(|| {
            warn!("Aggregator options payload missing for {}", url);
            Vec::new()
        });

        Ok(options)
    }

    async fn fetch_quotes(
        &self,
        url: String,
        option: &VaultOption,
        amounts: &[AmountSpec],
    ) -> Result<Vec<Quote>> {
        debug!("Fetching quotes from {}", url);
        let body = QuoteRequestBody { option, amounts };
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Aggregator returned {} for {}",
                response.status(),
                url
            )));
        }

        let body: QuotesResponse = response.json().await?;
        Ok(body.quotes.unwrap_or_default())
    }

    async fn fetch_step(
        &self,
        url: String,
        quote: &Quote,
        account: Address,
    ) -> Result<ExecutionStep> {
        debug!("Fetching execution step from {}", url);
        let body = StepRequestBody {
            quote,
            account: format!("{:?}", account),
        };
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Aggregator returned {} for {}",
                response.status(),
                url
            )));
        }

        let body: StepResponse = response.json().await?;
        body.step
            .ok_or_else(|| Error::Upstream(format!("Aggregator step payload missing for {}", url)))
    }
}

#[async_trait]
impl Aggregator for HttpAggregator {
    async fn deposit_options(
        &self,
        vault_id: &str,
        _state: &StateSnapshot,
    ) -> Result<Vec<VaultOption>> {
        self.fetch_options(format!("{}/vaults/{}/deposit-options", self.base_url, vault_id))
            .await
    }

    async fn withdraw_options(
        &self,
        vault_id: &str,
        _state: &StateSnapshot,
    ) -> Result<Vec<VaultOption>> {
        self.fetch_options(format!(
            "{}/vaults/{}/withdraw-options",
            self.base_url, vault_id
        ))
        .await
    }

    async fn deposit_quotes(
        &self,
        option: &VaultOption,
        amounts: &[AmountSpec],
        _state: &StateSnapshot,
    ) -> Result<Vec<Quote>> {
        self.fetch_quotes(format!("{}/quotes/deposit", self.base_url), option, amounts)
            .await
    }

    async fn withdraw_quotes(
        &self,
        option: &VaultOption,
        amounts: &[AmountSpec],
        _state: &StateSnapshot,
    ) -> Result<Vec<Quote>> {
        self.fetch_quotes(format!("{}/quotes/withdraw", self.base_url), option, amounts)
            .await
    }

    async fn deposit_step(
        &self,
        quote: &Quote,
        _state: &StateSnapshot,
        account: Address,
    ) -> Result<ExecutionStep> {
        self.fetch_step(format!("{}/steps/deposit", self.base_url), quote, account)
            .await
    }

    async fn withdraw_step(
        &self,
        quote: &Quote,
        _state: &StateSnapshot,
        account: Address,
    ) -> Result<ExecutionStep> {
        self.fetch_step(format!("{}/steps/withdraw", self.base_url), quote, account)
            .await
    }
}
