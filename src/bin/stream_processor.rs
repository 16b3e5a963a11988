// =============================================================================
// Stream processor — Kafka consumer driving Cassandra and Redis
// =============================================================================
//
// Three cooperating pieces: the consumer loop (this task), the batch worker
// (queue -> pipelined Redis flush), and the promotion worker (Redis scan ->
// Cassandra upsert).  SIGINT stops the consumer loop and signals the workers;
// in-flight batches are discarded.
// =============================================================================

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aurora_pipeline::broker::FrameConsumer;
use aurora_pipeline::config::ProcessorConfig;
use aurora_pipeline::processor::batcher::{self, AggregateSink};
use aurora_pipeline::processor::{promoter, StreamProcessor, BATCH_QUEUE_CAPACITY};
use aurora_pipeline::storage::{AggregateStore, MarketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ProcessorConfig::from_env()?;
    info!(
        topic = %cfg.kafka.topic,
        batch_size = cfg.batch_size,
        batch_interval_secs = cfg.batch_interval.as_secs(),
        daily_persist_secs = cfg.daily_persist_interval.as_secs(),
        "stream processor starting"
    );

    let store = Arc::new(MarketStore::connect(&cfg.cassandra).await?);
    let aggregates = Arc::new(AggregateStore::connect(&cfg.redis).await?);
    let consumer = FrameConsumer::new(&cfg.kafka)?;

    let (batch_tx, batch_rx) = mpsc::channel(BATCH_QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let batch_worker = tokio::spawn(batcher::run_batch_worker(
        batch_rx,
        aggregates.clone() as Arc<dyn AggregateSink>,
        cfg.batch_size,
        cfg.batch_interval,
        shutdown_rx.clone(),
    ));

    let promotion_worker = tokio::spawn(promoter::run_promotion_worker(
        aggregates.clone(),
        store.clone(),
        cfg.daily_persist_interval,
        shutdown_rx,
    ));

    let mut processor = StreamProcessor::new(store, aggregates, batch_tx);

    info!("all subsystems running; press Ctrl+C to stop");
    loop {
        tokio::select! {
            message = consumer.recv() => {
                match message {
                    Ok(Some(payload)) => processor.handle_message(&payload).await,
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "consumer poll failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("shutdown signal received - stopping consumer loop");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = batch_worker.await;
    let _ = promotion_worker.await;

    info!("stream processor shut down complete");
    Ok(())
}
