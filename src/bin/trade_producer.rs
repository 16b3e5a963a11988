// =============================================================================
// Trade producer — vendor WebSocket to Kafka
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_pipeline::broker::{FramePublisher, FrameProducer};
use aurora_pipeline::config::TradeProducerConfig;
use aurora_pipeline::ingest::{trade_feed, TickerLookup, RECONNECT_DELAY};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = TradeProducerConfig::from_env()?;
    info!(
        tickers = cfg.tickers.len(),
        topic = %cfg.kafka.topic,
        validate = cfg.validate_tickers,
        "trade producer starting"
    );

    let publisher: Arc<dyn FramePublisher> = Arc::new(FrameProducer::new(&cfg.kafka)?);
    let lookup = TickerLookup::new(&cfg.api_token)?;

    // Outer reconnect loop: the feed returns on close or error, never
    // recursing from inside a close handler.
    let feed_cfg = cfg.clone();
    let feed_publisher = publisher.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) =
                trade_feed::run_trade_feed(&feed_cfg, feed_publisher.clone(), &lookup).await
            {
                error!(error = %e, "trade feed error - reconnecting in 5s");
            } else {
                warn!("trade feed ended - reconnecting in 5s");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received - stopping trade producer");
    Ok(())
}
