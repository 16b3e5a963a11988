// =============================================================================
// Stock sync — scheduled fundamentals pull into Postgres
// =============================================================================
//
// One job per invocation: `stock-sync <sync_type>` with `SYNC_TYPE` as the
// environment fallback.  Exits 1 when the job failed outright or recorded
// any endpoint error.
// =============================================================================

use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aurora_pipeline::config::SyncConfig;
use aurora_pipeline::storage::FundamentalsStore;
use aurora_pipeline::sync::{SyncService, SyncType};
use aurora_pipeline::vendor::VendorClient;

#[derive(Debug, Parser)]
#[command(name = "stock-sync", about = "Sync fundamentals from the vendor API into Postgres")]
struct Args {
    /// Which job to run; falls back to the SYNC_TYPE environment variable.
    #[arg(value_enum)]
    sync_type: Option<SyncType>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = SyncConfig::from_env()?;

    let sync_type = match args.sync_type {
        Some(t) => t,
        None => cfg
            .sync_type
            .as_deref()
            .map(SyncType::from_str)
            .transpose()?
            .context("no sync type given (argument or SYNC_TYPE)")?,
    };

    let client = VendorClient::new(&cfg.api_key)?;
    let store = FundamentalsStore::connect(&cfg.postgres).await?;
    let service = SyncService::new(client, store, cfg.symbols.clone());

    let report = service.run_sync(sync_type).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_failure() {
        error!(sync_type = %report.sync_type, "sync finished with errors");
        std::process::exit(1);
    }

    info!(sync_type = %report.sync_type, "sync finished successfully");
    Ok(())
}
