//! CLI for minting API keys
//!
//! Prints the new key as JSON. The token is shown once and cannot be
//! recovered afterwards.

use anyhow::{Context, Result};
use clap::Parser;
use escrow_core::common::UserId;
use escrow_core::config::Config;
use escrow_core::domains::api_keys::actions::issue_api_key;
use escrow_core::domains::api_keys::IssueApiKeyRequest;
use escrow_core::kernel::ServerDeps;
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "issue_api_key")]
#[command(about = "Issue an API key for the escrow server")]
struct Cli {
    /// Human-readable key name, used in the audit log
    #[arg(long)]
    name: String,

    /// Scopes to grant (sender, support, admin)
    #[arg(long = "scope", required = true)]
    scopes: Vec<String>,

    /// Bind the key to a user (purchases default the beneficiary to it)
    #[arg(long)]
    user_id: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let deps = ServerDeps::from_config(pool, config);
    let request = IssueApiKeyRequest {
        name: cli.name,
        scopes: cli.scopes,
        user_id: cli.user_id.map(UserId::new),
    };

    let issued = issue_api_key(request, "cli", &deps)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("{}", serde_json::to_string_pretty(&issued)?);
    Ok(())
}
