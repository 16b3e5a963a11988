// =============================================================================
// News producer — vendor WebSocket to the wide-column news table
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_pipeline::config::NewsProducerConfig;
use aurora_pipeline::ingest::{news_feed, RECONNECT_DELAY};
use aurora_pipeline::storage::MarketStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = NewsProducerConfig::from_env()?;
    info!(tickers = cfg.tickers.len(), "news producer starting");

    let store = Arc::new(MarketStore::connect(&cfg.cassandra).await?);

    let feed_cfg = cfg.clone();
    let feed_store = store.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = news_feed::run_news_feed(&feed_cfg, &feed_store).await {
                error!(error = %e, "news feed error - reconnecting in 5s");
            } else {
                warn!("news feed ended - reconnecting in 5s");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received - stopping news producer");
    Ok(())
}
