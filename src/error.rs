//! Error types for the payload generator

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the payload generator
#[derive(Error, Debug)]
pub enum Error {
    // Entry-point / request errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Pipeline errors
    #[error("No options available: {0}")]
    NoOptionsAvailable(String),

    #[error("No quotes available: {0}")]
    NoQuotesAvailable(String),

    // Provider errors
    #[error("Signing unavailable: account context is read-only")]
    SigningUnavailable,

    #[error("RPC error: {0}")]
    Rpc(String),

    // Collaborator errors
    #[error("Upstream failure: {0}")]
    Upstream(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error means the deployment mode cannot sign,
    /// as opposed to the request itself being bad.
    pub fn is_signing_unavailable(&self) -> bool {
        matches!(self, Error::SigningUnavailable)
    }

    /// Check if this error was caused by the caller's input
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from HTTP client errors (aggregator calls)
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upstream(e.to_string())
    }
}

// Conversion from node provider errors
impl From<ethers::providers::ProviderError> for Error {
    fn from(e: ethers::providers::ProviderError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from local signer errors
impl From<ethers::signers::WalletError> for Error {
    fn from(e: ethers::signers::WalletError) -> Self {
        Error::Rpc(format!("signing failed: {}", e))
    }
}
