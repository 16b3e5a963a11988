// =============================================================================
// Batch worker — drains the trade queue into pipelined KV flushes
// =============================================================================
//
// The worker collects up to `batch_size` trades with a short per-take
// timeout and flushes when the batch is full or the batch interval has
// elapsed with something pending.  A failed flush is logged and the batch
// discarded; the raw trades were already persisted to the trades table, so
// the loss is bounded to the hot aggregate.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::storage::AggregateStore;
use crate::types::QueuedTrade;

/// Per-take timeout while filling a batch.
const TAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Idle sleep when the queue is empty.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Destination of a batch flush.  [`AggregateStore`] is the production
/// implementation; tests substitute a collector.
#[async_trait]
pub trait AggregateSink: Send + Sync {
    async fn apply_batch(&self, batch: &[QueuedTrade]) -> Result<()>;
}

#[async_trait]
impl AggregateSink for AggregateStore {
    async fn apply_batch(&self, batch: &[QueuedTrade]) -> Result<()> {
        AggregateStore::apply_batch(self, batch).await
    }
}

/// Flush once the batch is full, or once a non-empty batch has waited out
/// the interval.
fn should_flush(len: usize, elapsed: Duration, batch_size: usize, batch_interval: Duration) -> bool {
    len >= batch_size || (len > 0 && elapsed >= batch_interval)
}

/// Run until the queue closes or the shutdown signal flips.  In-flight
/// batches are discarded on shutdown.
pub async fn run_batch_worker(
    mut queue: mpsc::Receiver<QueuedTrade>,
    sink: Arc<dyn AggregateSink>,
    batch_size: usize,
    batch_interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    let mut pending: Vec<QueuedTrade> = Vec::with_capacity(batch_size);
    let mut last_flush = Instant::now();

    info!(batch_size, batch_interval_secs = batch_interval.as_secs(), "batch worker started");

    loop {
        if *shutdown.borrow() {
            info!(discarded = pending.len(), "batch worker stopping");
            return;
        }

        // Fill the batch; a take timeout just means the queue went quiet.
        while pending.len() < batch_size {
            match tokio::time::timeout(TAKE_TIMEOUT, queue.recv()).await {
                Ok(Some(trade)) => pending.push(trade),
                Ok(None) => {
                    info!(discarded = pending.len(), "batch queue closed; worker stopping");
                    return;
                }
                Err(_) => break,
            }
        }

        if should_flush(pending.len(), last_flush.elapsed(), batch_size, batch_interval) {
            match sink.apply_batch(&pending).await {
                Ok(()) => debug!(count = pending.len(), "flushed daily aggregates"),
                Err(e) => warn!(count = pending.len(), error = %e, "daily aggregate flush failed"),
            }
            pending.clear();
            last_flush = Instant::now();
        }

        if pending.is_empty() {
            tokio::time::sleep(IDLE_SLEEP).await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    struct CollectingSink {
        flushes: Mutex<Vec<Vec<QueuedTrade>>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                flushes: Mutex::new(Vec::new()),
            })
        }

        fn flush_sizes(&self) -> Vec<usize> {
            self.flushes.lock().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl AggregateSink for CollectingSink {
        async fn apply_batch(&self, batch: &[QueuedTrade]) -> Result<()> {
            self.flushes.lock().push(batch.to_vec());
            Ok(())
        }
    }

    fn trade(symbol: &str) -> QueuedTrade {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        QueuedTrade::new(symbol, 10.0, 3.0, ts)
    }

    #[test]
    fn flush_on_size_or_age() {
        let interval = Duration::from_secs(10);
        assert!(should_flush(100, Duration::ZERO, 100, interval));
        assert!(should_flush(150, Duration::ZERO, 100, interval));
        assert!(should_flush(1, Duration::from_secs(10), 100, interval));
        assert!(!should_flush(1, Duration::from_secs(9), 100, interval));
        assert!(!should_flush(0, Duration::from_secs(60), 100, interval));
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_flushes_immediately() {
        let sink = CollectingSink::new();
        let (tx, rx) = mpsc::channel(1000);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_batch_worker(
            rx,
            sink.clone() as Arc<dyn AggregateSink>,
            3,
            Duration::from_secs(10),
            stop_rx,
        ));

        for _ in 0..3 {
            tx.send(trade("AAPL")).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(sink.flush_sizes(), vec![3]);

        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_flushes_after_interval() {
        let sink = CollectingSink::new();
        let (tx, rx) = mpsc::channel(1000);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_batch_worker(
            rx,
            sink.clone() as Arc<dyn AggregateSink>,
            100,
            Duration::from_secs(10),
            stop_rx,
        ));

        tx.send(trade("AAPL")).await.unwrap();
        tx.send(trade("MSFT")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(sink.flush_sizes().is_empty(), "flushed before the interval");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(sink.flush_sizes(), vec![2]);

        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending_batch() {
        let sink = CollectingSink::new();
        let (tx, rx) = mpsc::channel(1000);
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_batch_worker(
            rx,
            sink.clone() as Arc<dyn AggregateSink>,
            100,
            Duration::from_secs(60),
            stop_rx,
        ));

        tx.send(trade("AAPL")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        stop_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        worker.await.unwrap();

        assert!(sink.flush_sizes().is_empty());
        drop(tx);
    }
}
