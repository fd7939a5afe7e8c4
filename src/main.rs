//! Headless vault payload generator
//!
//! Produces an on-chain `{to, data, value}` transaction payload for a
//! vault deposit or withdraw without an interactive wallet, driving the
//! external aggregator's option -> quote -> execution-step sequence.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use vault_payloader::cli::commands;
use vault_payloader::config::Config;

/// Headless vault payload generator
#[derive(Parser)]
#[command(name = "payloader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a transaction payload for a vault operation
    Generate {
        /// Vault identifier
        #[arg(long)]
        vault: String,

        /// Operation type: deposit or withdraw
        #[arg(long = "type")]
        operation: String,

        /// Amount as a decimal string, or "all"
        #[arg(long, default_value = "all")]
        amount: String,

        /// Optional read-only wallet address override
        #[arg(long)]
        wallet: Option<String>,
    },

    /// Show current configuration (credential masked)
    Config,

    /// Check node and aggregator reachability
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault_payloader=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Generate {
            vault,
            operation,
            amount,
            wallet,
        } => commands::generate(&config, &vault, &operation, &amount, wallet).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
