//! Payload generation pipeline
//!
//! One run per invocation, no persisted state across runs. Drives the
//! aggregator through option -> quote -> execution-step -> dispatch and
//! extracts the final `{to, data, value}` transaction payload. Every
//! failure is folded into the run's `PipelineResult`; nothing crashes
//! the host process and nothing is retried except the bounded readiness
//! probe at startup.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::AccountContext;
use crate::aggregator::{Aggregator, AmountSpec, TokenRef, VaultOption};
use crate::config::ReadinessConfig;
use crate::error::{Error, Result};
use crate::poller::poll_until_ready;
use crate::selector::{select_deposit_option, select_quote, select_withdraw_option};
use crate::state::StateContainer;

/// Placeholder amount used where the aggregator needs a non-zero value:
/// full withdraws (`is_max` carries the real semantics) and the literal
/// deposit "all", which has no max-deposit concept upstream.
const PLACEHOLDER_AMOUNT: &str = "1";

/// Recognized operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
}

/// Raw entry-point parameters, exactly as the outer surface accepts them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryParams {
    #[serde(rename = "vaultId")]
    pub vault_id: Option<String>,
    #[serde(rename = "type")]
    pub operation: Option<String>,
    pub amount: Option<String>,
    pub wallet: Option<String>,
}

/// Parsed, validated request. Immutable for the run.
#[derive(Debug, Clone)]
pub struct VaultOperationRequest {
    pub vault_id: String,
    pub kind: OperationKind,
    pub amount: String,
    pub wallet: Option<Address>,
}

impl VaultOperationRequest {
    /// Validate entry parameters. Missing or unrecognized values are an
    /// immediate terminal failure; no collaborator is called.
    pub fn parse(params: EntryParams) -> Result<Self> {
        let vault_id = params
            .vault_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("Vault id is required".to_string()))?;

        let kind = match params.operation.as_deref() {
            Some("deposit") => OperationKind::Deposit,
            Some("withdraw") => OperationKind::Withdraw,
            _ => {
                return Err(Error::InvalidInput(
                    "Type must be deposit or withdraw".to_string(),
                ))
            }
        };

        let wallet = match params.wallet {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|e| Error::InvalidInput(format!("Invalid wallet address: {}", e)))?,
            ),
            None => None,
        };

        Ok(Self {
            vault_id,
            kind,
            amount: params.amount.unwrap_or_else(|| "all".to_string()),
            wallet,
        })
    }
}

/// Final on-chain transaction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub to: String,
    pub data: String,
    #[serde(default = "default_value_field")]
    pub value: String,
}

fn default_value_field() -> String {
    "0".to_string()
}

/// Terminal, externally observable output of one pipeline run.
///
/// `ready` signals "run finished", not "succeeded" - it is true at the
/// end of both the success and the failure path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub ready: bool,
    pub error: Option<String>,
    pub payload: Option<TransactionPayload>,
}

impl PipelineResult {
    fn success(payload: TransactionPayload) -> Self {
        Self {
            ready: true,
            error: None,
            payload: Some(payload),
        }
    }

    fn failure(error: &Error) -> Self {
        Self {
            ready: true,
            error: Some(error.to_string()),
            payload: None,
        }
    }
}

/// Orchestrates one deposit or withdraw payload run
pub struct Pipeline<A: Aggregator, S: StateContainer> {
    aggregator: A,
    state: S,
    account: Arc<AccountContext>,
    preferred_token: String,
    readiness: ReadinessConfig,
}

impl<A: Aggregator, S: StateContainer> Pipeline<A, S> {
    pub fn new(
        aggregator: A,
        state: S,
        account: Arc<AccountContext>,
        preferred_token: String,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            aggregator,
            state,
            account,
            preferred_token,
            readiness,
        }
    }

    /// Run the full state machine once. Never returns an error: every
    /// failure is folded into the result.
    pub async fn run(&self, params: EntryParams) -> PipelineResult {
        let request = match VaultOperationRequest::parse(params) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected pipeline input: {}", e);
                return PipelineResult::failure(&e);
            }
        };

        info!(
            "Running {:?} pipeline for vault {} (amount: {})",
            request.kind, request.vault_id, request.amount
        );

        match self.execute(&request).await {
            Ok(payload) => PipelineResult::success(payload),
            Err(e) => {
                warn!("Pipeline run failed: {}", e);
                PipelineResult::failure(&e)
            }
        }
    }

    async fn execute(&self, request: &VaultOperationRequest) -> Result<TransactionPayload> {
        // The wallet override re-binds the run to a read-only address
        let account = request.wallet.unwrap_or_else(|| self.account.address());

        self.await_readiness(&request.vault_id).await;

        let snapshot = self.state.snapshot();

        let options = match request.kind {
            OperationKind::Deposit => {
                self.aggregator
                    .deposit_options(&request.vault_id, &snapshot)
                    .await?
            }
            OperationKind::Withdraw => {
                self.aggregator
                    .withdraw_options(&request.vault_id, &snapshot)
                    .await?
            }
        };
        debug!("Fetched {} options", options.len());

        let option = match request.kind {
            OperationKind::Deposit => select_deposit_option(&options, &self.preferred_token)?,
            OperationKind::Withdraw => select_withdraw_option(&options, &self.preferred_token)?,
        };

        let amounts = build_amount_specs(request, option)?;

        let quotes = match request.kind {
            OperationKind::Deposit => {
                self.aggregator
                    .deposit_quotes(option, &amounts, &snapshot)
                    .await?
            }
            OperationKind::Withdraw => {
                self.aggregator
                    .withdraw_quotes(option, &amounts, &snapshot)
                    .await?
            }
        };
        debug!("Fetched {} quotes", quotes.len());

        let quote = select_quote(&quotes)?;

        let step = match request.kind {
            OperationKind::Deposit => {
                self.aggregator
                    .deposit_step(quote, &snapshot, account)
                    .await?
            }
            OperationKind::Withdraw => {
                self.aggregator
                    .withdraw_step(quote, &snapshot, account)
                    .await?
            }
        };

        let resolved = self.state.dispatch(step.action).await?;

        let payload: TransactionPayload = serde_json::from_value(resolved)
            .map_err(|e| Error::Upstream(format!("Dispatch result not a transaction: {}", e)))?;

        if payload.to.is_empty() || payload.data.is_empty() {
            return Err(Error::Upstream(
                "Dispatch result missing transaction payload fields".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Bounded wait for the aggregator's deposit-option data, used as a
    /// general liveness signal even for withdraw runs. Insufficient
    /// readiness is a soft failure: the real fetch performs its own
    /// empty-result check.
    async fn await_readiness(&self, vault_id: &str) {
        let snapshot = self.state.snapshot();
        let aggregator = &self.aggregator;

        let outcome = poll_until_ready(
            || {
                let snapshot = snapshot.clone();
                async move {
                    match aggregator.deposit_options(vault_id, &snapshot).await {
                        Ok(options) => options.len(),
                        Err(e) => {
                            debug!("Readiness probe failed: {}", e);
                            0
                        }
                    }
                }
            },
            self.readiness.minimum_options,
            self.readiness.max_attempts,
            Duration::from_millis(self.readiness.interval_ms),
        )
        .await;

        if outcome.is_ready(self.readiness.minimum_options) {
            debug!(
                "Aggregator ready after {} attempt(s): {} options",
                outcome.attempts, outcome.count
            );
        } else {
            warn!(
                "Aggregator not ready after {} attempt(s) ({} of {} options), proceeding",
                outcome.attempts, outcome.count, self.readiness.minimum_options
            );
        }
    }
}

/// Build the amount specs the quoting call requires.
///
/// A literal zero amount must never reach the aggregator: full withdraws
/// carry `is_max = true` with a positive placeholder instead.
fn build_amount_specs(
    request: &VaultOperationRequest,
    option: &VaultOption,
) -> Result<Vec<AmountSpec>> {
    let token = match request.kind {
        OperationKind::Deposit => option.input_tokens.first(),
        OperationKind::Withdraw => option.wanted_tokens.first(),
    }
    .cloned()
    .ok_or_else(|| Error::Upstream("Selected option carries no tokens".to_string()))?;

    let spec = match request.kind {
        OperationKind::Deposit => build_deposit_amount(request, token)?,
        OperationKind::Withdraw => build_withdraw_amount(request, token),
    };

    Ok(vec![spec])
}

fn build_deposit_amount(request: &VaultOperationRequest, token: TokenRef) -> Result<AmountSpec> {
    // No max-deposit concept upstream: "all" degrades to the documented
    // placeholder amount, not a true max semantics
    if request.amount == "all" {
        return Ok(AmountSpec {
            token,
            amount: PLACEHOLDER_AMOUNT.to_string(),
            is_max: false,
        });
    }

    let parsed: f64 = request
        .amount
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid amount: {}", request.amount)))?;
    // "NaN" and "inf" parse as f64; neither may reach the aggregator
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Amount must be a positive number, got {}",
            request.amount
        )));
    }

    Ok(AmountSpec {
        token,
        amount: request.amount.clone(),
        is_max: false,
    })
}

fn build_withdraw_amount(request: &VaultOperationRequest, token: TokenRef) -> AmountSpec {
    // Anything that is not a concrete positive finite amount means
    // "everything": "all", non-numeric, non-finite, zero or negative
    let is_max = request.amount == "all"
        || request
            .amount
            .parse::<f64>()
            .map(|amount| !amount.is_finite() || amount <= 0.0)
            .unwrap_or(true);

    if is_max {
        AmountSpec {
            token,
            amount: PLACEHOLDER_AMOUNT.to_string(),
            is_max: true,
        }
    } else {
        AmountSpec {
            token,
            amount: request.amount.clone(),
            is_max: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Credential;
    use crate::aggregator::{DispatchableAction, ExecutionStep, Quote};
    use crate::state::{MemoryStateContainer, StateSnapshot};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockAggregator {
        options: Vec<VaultOption>,
        quotes: Vec<Quote>,
        step: ExecutionStep,
        calls: AtomicUsize,
        seen_amounts: Mutex<Option<Vec<AmountSpec>>>,
    }

    impl MockAggregator {
        fn new(options: Vec<VaultOption>, quotes: Vec<Quote>) -> Self {
            Self {
                options,
                quotes,
                step: ExecutionStep {
                    action: DispatchableAction {
                        kind: "vault/executeStep".to_string(),
                        payload: json!({
                            "to": "0x00000000000000000000000000000000000000cc",
                            "data": "0xdeadbeef",
                            "value": "0"
                        }),
                    },
                },
                calls: AtomicUsize::new(0),
                seen_amounts: Mutex::new(None),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record_amounts(&self, amounts: &[AmountSpec]) {
            *self.seen_amounts.lock().unwrap() = Some(amounts.to_vec());
        }
    }

    #[async_trait]
    impl Aggregator for MockAggregator {
        async fn deposit_options(
            &self,
            _vault_id: &str,
            _state: &StateSnapshot,
        ) -> crate::error::Result<Vec<VaultOption>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.options.clone())
        }

        async fn withdraw_options(
            &self,
            _vault_id: &str,
            _state: &StateSnapshot,
        ) -> crate::error::Result<Vec<VaultOption>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.options.clone())
        }

        async fn deposit_quotes(
            &self,
            _option: &VaultOption,
            amounts: &[AmountSpec],
            _state: &StateSnapshot,
        ) -> crate::error::Result<Vec<Quote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record_amounts(amounts);
            Ok(self.quotes.clone())
        }

        async fn withdraw_quotes(
            &self,
            _option: &VaultOption,
            amounts: &[AmountSpec],
            _state: &StateSnapshot,
        ) -> crate::error::Result<Vec<Quote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record_amounts(amounts);
            Ok(self.quotes.clone())
        }

        async fn deposit_step(
            &self,
            _quote: &Quote,
            _state: &StateSnapshot,
            _account: Address,
        ) -> crate::error::Result<ExecutionStep> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.step.clone())
        }

        async fn withdraw_step(
            &self,
            _quote: &Quote,
            _state: &StateSnapshot,
            _account: Address,
        ) -> crate::error::Result<ExecutionStep> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.step.clone())
        }
    }

    fn token(symbol: &str) -> TokenRef {
        TokenRef {
            address: format!("0x{}", symbol.to_lowercase()),
            symbol: symbol.to_string(),
        }
    }

    fn usdc_option() -> VaultOption {
        VaultOption {
            id: Some("opt-1".to_string()),
            input_tokens: vec![token("USDC")],
            wanted_tokens: vec![token("USDC")],
        }
    }

    fn quotes() -> Vec<Quote> {
        vec![Quote(json!({"id": "q-1"}))]
    }

    fn fast_readiness() -> ReadinessConfig {
        ReadinessConfig {
            minimum_options: 1,
            max_attempts: 1,
            interval_ms: 1,
        }
    }

    fn read_only_account() -> Arc<AccountContext> {
        let address: Address = "0x00000000000000000000000000000000000000aa"
            .parse()
            .unwrap();
        Arc::new(AccountContext::new(Credential::Address(address)).unwrap())
    }

    fn pipeline(
        aggregator: MockAggregator,
    ) -> Pipeline<MockAggregator, MemoryStateContainer> {
        Pipeline::new(
            aggregator,
            MemoryStateContainer::default(),
            read_only_account(),
            "USDC".to_string(),
            fast_readiness(),
        )
    }

    fn params(operation: &str, amount: &str) -> EntryParams {
        EntryParams {
            vault_id: Some("vault-1".to_string()),
            operation: Some(operation.to_string()),
            amount: Some(amount.to_string()),
            wallet: None,
        }
    }

    #[tokio::test]
    async fn test_deposit_happy_path_produces_payload() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("deposit", "250.5")).await;

        assert!(result.ready);
        assert!(result.error.is_none());
        let payload = result.payload.unwrap();
        assert!(!payload.to.is_empty());
        assert!(!payload.data.is_empty());
        assert_eq!(payload.value, "0");
    }

    #[tokio::test]
    async fn test_missing_type_fails_without_aggregator_call() {
        let aggregator = MockAggregator::new(vec![usdc_option()], quotes());
        let pipeline = pipeline(aggregator);

        let result = pipeline
            .run(EntryParams {
                vault_id: Some("vault-1".to_string()),
                operation: None,
                amount: None,
                wallet: None,
            })
            .await;

        assert!(result.ready);
        assert!(result.payload.is_none());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("deposit or withdraw"));
        assert_eq!(pipeline.aggregator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_type_fails_without_aggregator_call() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("borrow", "1")).await;

        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("deposit or withdraw"));
        assert_eq!(pipeline.aggregator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_vault_id_is_invalid_input() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline
            .run(EntryParams {
                vault_id: None,
                operation: Some("deposit".to_string()),
                amount: None,
                wallet: None,
            })
            .await;

        assert!(result.error.as_deref().unwrap().contains("Vault id"));
        assert_eq!(pipeline.aggregator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_withdraw_all_sets_max_with_positive_placeholder() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("withdraw", "all")).await;
        assert!(result.error.is_none());

        let amounts = pipeline
            .aggregator
            .seen_amounts
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        assert_eq!(amounts.len(), 1);
        assert!(amounts[0].is_max);
        assert!(amounts[0].amount.parse::<f64>().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_withdraw_non_positive_amount_routes_through_max() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("withdraw", "-3")).await;
        assert!(result.error.is_none());

        let amounts = pipeline
            .aggregator
            .seen_amounts
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        assert!(amounts[0].is_max);
        assert_eq!(amounts[0].amount, "1");
    }

    #[tokio::test]
    async fn test_withdraw_concrete_amount_is_not_max() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("withdraw", "42.5")).await;
        assert!(result.error.is_none());

        let amounts = pipeline
            .aggregator
            .seen_amounts
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        assert!(!amounts[0].is_max);
        assert_eq!(amounts[0].amount, "42.5");
    }

    #[tokio::test]
    async fn test_deposit_non_finite_amount_is_rejected() {
        for amount in ["NaN", "inf", "-inf"] {
            let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

            let result = pipeline.run(params("deposit", amount)).await;

            assert!(result.ready);
            assert!(result.error.as_deref().unwrap().contains("Amount"));
            // Never quoted, so the literal string cannot reach the aggregator
            assert!(pipeline.aggregator.seen_amounts.lock().unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_withdraw_non_finite_amount_routes_through_max() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("withdraw", "NaN")).await;
        assert!(result.error.is_none());

        let amounts = pipeline
            .aggregator
            .seen_amounts
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        assert!(amounts[0].is_max);
        assert_eq!(amounts[0].amount, "1");
    }

    #[tokio::test]
    async fn test_deposit_all_uses_placeholder_not_max() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], quotes()));

        let result = pipeline.run(params("deposit", "all")).await;
        assert!(result.error.is_none());

        let amounts = pipeline
            .aggregator
            .seen_amounts
            .lock()
            .unwrap()
            .clone()
            .unwrap();
        assert!(!amounts[0].is_max);
        assert_eq!(amounts[0].amount, "1");
    }

    #[tokio::test]
    async fn test_empty_options_is_terminal_failure() {
        let pipeline = pipeline(MockAggregator::new(Vec::new(), quotes()));

        let result = pipeline.run(params("deposit", "10")).await;

        assert!(result.ready);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("No options available"));
        assert!(result.payload.is_none());
    }

    #[tokio::test]
    async fn test_empty_quotes_is_terminal_failure() {
        let pipeline = pipeline(MockAggregator::new(vec![usdc_option()], Vec::new()));

        let result = pipeline.run(params("deposit", "10")).await;

        assert!(result.ready);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("No quotes available"));
    }

    #[test]
    fn test_pipeline_result_json_round_trip() {
        let result = PipelineResult {
            ready: true,
            error: None,
            payload: Some(TransactionPayload {
                to: "0x00000000000000000000000000000000000000cc".to_string(),
                data: "0xdeadbeef".to_string(),
                value: "0".to_string(),
            }),
        };

        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: PipelineResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(result, decoded);

        let failed = PipelineResult {
            ready: true,
            error: Some("No quotes available: no quotes returned".to_string()),
            payload: None,
        };
        let encoded = serde_json::to_string(&failed).unwrap();
        let decoded: PipelineResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(failed, decoded);
    }
}
