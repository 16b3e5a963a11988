// =============================================================================
// Stream processor — decode, persist, window, and enqueue trades
// =============================================================================
//
// The consumer loop is synchronous per message: decode the envelope, then per
// trade INSERT into `trades`, update the symbol's 15-second ring, and offer
// the trade to the batch queue without blocking.  The 5-second running
// averages are driven from the same loop by wall-clock comparison; the batch
// and promotion workers run as separate tasks (see `batcher` / `promoter`).
// =============================================================================

pub mod batcher;
pub mod promoter;
pub mod running_window;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::{AggregateStore, MarketStore};
use crate::types::{
    render_conditions, AggregateSource, DailyAggregateView, QueuedTrade,
};
use crate::wire::{self, Trade};
use running_window::RunningWindows;

/// Bound on trades waiting for the batch worker; over-capacity offers are
/// dropped so the consumer loop never blocks.
pub const BATCH_QUEUE_CAPACITY: usize = 10_000;

/// Cadence of the running-average emission.
const AVERAGE_EMIT_INTERVAL: Duration = Duration::from_secs(5);

pub struct StreamProcessor {
    store: Arc<MarketStore>,
    aggregates: Arc<AggregateStore>,
    windows: RunningWindows,
    batch_queue: mpsc::Sender<QueuedTrade>,
    last_average_emit: Instant,
}

impl StreamProcessor {
    pub fn new(
        store: Arc<MarketStore>,
        aggregates: Arc<AggregateStore>,
        batch_queue: mpsc::Sender<QueuedTrade>,
    ) -> Self {
        Self {
            store,
            aggregates,
            windows: RunningWindows::new(),
            batch_queue,
            last_average_emit: Instant::now(),
        }
    }

    /// Handle one message from the log.  Decode failures skip the message;
    /// per-trade failures skip the trade.
    pub async fn handle_message(&mut self, payload: &[u8]) {
        let envelope = match wire::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "failed to decode envelope");
                return;
            }
        };

        for trade in &envelope.data {
            self.process_trade(trade).await;
        }

        self.maybe_emit_running_averages().await;
    }

    async fn process_trade(&mut self, trade: &Trade) {
        let Some(trade_ts) = Utc.timestamp_millis_opt(trade.timestamp_ms).single() else {
            warn!(symbol = %trade.symbol, ms = trade.timestamp_ms, "trade timestamp out of range");
            return;
        };
        let ingest_ts = Utc::now();

        if let Err(e) = self
            .store
            .insert_trade(
                Uuid::new_v4(),
                &trade.symbol,
                &render_conditions(&trade.conditions),
                trade.price,
                trade.volume,
                trade_ts,
                ingest_ts,
            )
            .await
        {
            warn!(symbol = %trade.symbol, error = %e, "trade insert failed; dropping trade");
            return;
        }

        self.windows
            .push(&trade.symbol, trade.price, trade.volume, trade_ts, ingest_ts);

        let queued = QueuedTrade::new(&trade.symbol, trade.price, trade.volume, trade_ts);
        match self.batch_queue.try_send(queued) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(symbol = %trade.symbol, "batch queue full; dropping trade from KV path")
            }
            Err(TrySendError::Closed(_)) => {
                warn!(symbol = %trade.symbol, "batch queue closed; dropping trade from KV path")
            }
        }
    }

    /// Emit one `running_averages_15_sec` row per active symbol every five
    /// seconds of wall clock.
    async fn maybe_emit_running_averages(&mut self) {
        if self.last_average_emit.elapsed() < AVERAGE_EMIT_INTERVAL {
            return;
        }

        let now = Utc::now();
        for (symbol, average) in self.windows.averages(now) {
            match self
                .store
                .insert_average(Uuid::new_v4(), &symbol, average, now)
                .await
            {
                Ok(()) => debug!(symbol = %symbol, average, "running average stored"),
                Err(e) => warn!(symbol = %symbol, error = %e, "running average insert failed"),
            }
        }

        self.last_average_emit = Instant::now();
    }

    /// Daily-aggregate lookup: hot KV tier first, then the promoted
    /// wide-column row, else nothing.
    pub async fn get_daily_aggregate(
        &self,
        symbol: &str,
        trade_date: Option<NaiveDate>,
    ) -> Result<Option<DailyAggregateView>> {
        let trade_date = trade_date.unwrap_or_else(|| Utc::now().date_naive());

        if let Some(aggregate) = self.aggregates.get_aggregate(symbol, trade_date).await? {
            return Ok(Some(DailyAggregateView {
                aggregate,
                source: AggregateSource::Redis,
            }));
        }

        if let Some(aggregate) = self.store.fetch_daily_aggregate(symbol, trade_date).await? {
            return Ok(Some(DailyAggregateView {
                aggregate,
                source: AggregateSource::Cassandra,
            }));
        }

        Ok(None)
    }
}
