//! Headless Vault Payload Generator Library
//!
//! An injected wallet provider emulating the standardized browser wallet
//! interface against a remote node, plus the pipeline that drives an
//! external quoting/aggregation API to a final transaction payload.

pub mod account;
pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod poller;
pub mod provider;
pub mod selector;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{EntryParams, Pipeline, PipelineResult, TransactionPayload};
pub use provider::{provider_for, RpcRequest, WalletProvider};
