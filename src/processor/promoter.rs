// =============================================================================
// Promotion worker — copies hot KV aggregates into the wide-column store
// =============================================================================
//
// Every pass scans `daily_agg:*`, reads each hash, and upserts the row into
// `daily_aggregates` with `created_at = updated_at = now` (Cassandra INSERT
// semantics make this an upsert).  Failed promotions are not retried: the KV
// state survives until its 30-day TTL, so the next pass heals them.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::storage::{AggregateStore, MarketStore};

/// How often the worker wakes to check whether a pass is due.
const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Run promotion passes every `persist_interval` until shutdown.
pub async fn run_promotion_worker(
    aggregates: Arc<AggregateStore>,
    store: Arc<MarketStore>,
    persist_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(CHECK_INTERVAL);
    let mut last_persist = Instant::now();

    info!(persist_interval_secs = persist_interval.as_secs(), "promotion worker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if last_persist.elapsed() < persist_interval {
                    continue;
                }
                match promote_daily_aggregates(&aggregates, &store).await {
                    Ok((promoted, scanned)) => {
                        info!(promoted, scanned, "daily aggregate promotion pass complete")
                    }
                    Err(e) => warn!(error = %e, "daily aggregate promotion pass failed"),
                }
                last_persist = Instant::now();
            }
            _ = shutdown.changed() => {
                info!("promotion worker stopping");
                return;
            }
        }
    }
}

/// One promotion pass.  Returns `(promoted, scanned)`; per-key failures are
/// logged and the scan continues.
pub async fn promote_daily_aggregates(
    aggregates: &AggregateStore,
    store: &MarketStore,
) -> Result<(usize, usize)> {
    let keys = aggregates.scan_daily_keys().await?;
    let mut promoted = 0;

    for key in &keys {
        match promote_key(aggregates, store, key).await {
            Ok(true) => promoted += 1,
            Ok(false) => {}
            Err(e) => warn!(key = %key, error = %e, "failed to promote daily aggregate"),
        }
    }

    Ok((promoted, keys.len()))
}

/// Promote a single key; `Ok(false)` means the key was absent or empty.
async fn promote_key(aggregates: &AggregateStore, store: &MarketStore, key: &str) -> Result<bool> {
    let Some(aggregate) = aggregates.read_aggregate(key).await? else {
        return Ok(false);
    };

    let now = Utc::now();
    store.upsert_daily_aggregate(&aggregate, now, now).await?;
    Ok(true)
}
