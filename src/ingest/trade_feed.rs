// =============================================================================
// Trade feed — WebSocket ingestion with a latest-wins throttle
// =============================================================================
//
// The vendor emits trades at sub-second cadence; downstream storage only
// needs one frame per second.  The socket reader overwrites a single-slot
// last-writer-wins channel, and the throttle worker wakes every 100 ms,
// publishing the newest frame once at least a second has passed since the
// last emit.  Older buffered frames are discarded by construction.
//
// Runs until the stream disconnects or an error occurs, then returns so that
// the caller (the binary) can handle reconnection.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::{TickerLookup, FINNHUB_WS_URL, SUBSCRIBE_PACING};
use crate::broker::FramePublisher;
use crate::config::TradeProducerConfig;
use crate::wire::{self, Envelope};

/// How often the throttle worker checks the slot.
const THROTTLE_TICK: Duration = Duration::from_millis(100);

/// Minimum wall-clock spacing between published frames.
const MIN_EMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Connect, subscribe the configured tickers, and pump frames through the
/// throttle until the socket closes.
pub async fn run_trade_feed(
    cfg: &TradeProducerConfig,
    publisher: Arc<dyn FramePublisher>,
    lookup: &TickerLookup,
) -> Result<()> {
    let url = format!("{FINNHUB_WS_URL}?token={}", cfg.api_token);
    info!(tickers = cfg.tickers.len(), "connecting to trade WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to trade WebSocket")?;
    info!("trade WebSocket connected");

    let (mut write, mut read) = ws_stream.split();

    // Subscribe fan-out, paced to avoid server-side throttling.
    for ticker in &cfg.tickers {
        if cfg.validate_tickers {
            match lookup.exists(ticker).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(ticker, "subscription skipped - ticker not found");
                    continue;
                }
                Err(e) => {
                    warn!(ticker, error = %e, "ticker validation failed - skipping");
                    continue;
                }
            }
        }

        let frame = serde_json::json!({"type": "subscribe", "symbol": ticker}).to_string();
        write
            .send(Message::Text(frame))
            .await
            .with_context(|| format!("failed to subscribe to {ticker}"))?;
        info!(ticker, "subscribed");
        tokio::time::sleep(SUBSCRIBE_PACING).await;
    }

    // Single-slot latest buffer plus its worker.  Dropping the sender when
    // the socket ends stops the worker cleanly.
    let (slot_tx, slot_rx) = watch::channel::<Option<String>>(None);
    let worker = tokio::spawn(run_throttle_worker(
        slot_rx,
        publisher.clone(),
        MIN_EMIT_INTERVAL,
    ));

    let outcome = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                // Last writer wins; older unpublished frames are discarded.
                let _ = slot_tx.send(Some(text));
            }
            Some(Ok(Message::Close(_))) => {
                warn!("trade WebSocket closed by server");
                break Ok(());
            }
            Some(Ok(_)) => {
                // Ping/Pong/Binary frames -- tungstenite answers pings itself.
            }
            Some(Err(e)) => {
                error!(error = %e, "trade WebSocket read error");
                break Err(e.into());
            }
            None => {
                warn!("trade WebSocket stream ended");
                break Ok(());
            }
        }
    };

    drop(slot_tx);
    let _ = worker.await;
    outcome
}

/// Throttle worker: every tick, publish the newest unseen frame when the
/// emit interval has elapsed.  Exits when the slot sender is dropped.
pub(crate) async fn run_throttle_worker(
    mut slot: watch::Receiver<Option<String>>,
    publisher: Arc<dyn FramePublisher>,
    min_emit_interval: Duration,
) {
    let mut ticker = tokio::time::interval(THROTTLE_TICK);
    let mut last_emit = Instant::now();

    loop {
        ticker.tick().await;

        match slot.has_changed() {
            Ok(true) => {
                if last_emit.elapsed() < min_emit_interval {
                    continue;
                }
                let frame = slot.borrow_and_update().clone();
                if let Some(text) = frame {
                    emit_frame(&text, publisher.as_ref()).await;
                    last_emit = Instant::now();
                }
            }
            Ok(false) => {}
            Err(_) => {
                debug!("trade feed closed; throttle worker stopping");
                return;
            }
        }
    }
}

/// Decode a vendor JSON frame, re-encode it as a binary envelope, and
/// publish.  Both failure modes drop the frame and are non-fatal.
async fn emit_frame(text: &str, publisher: &dyn FramePublisher) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            warn!(error = %e, "failed to decode trade frame");
            return;
        }
    };

    let payload = wire::encode(&envelope);
    match publisher.publish(&payload).await {
        Ok(()) => debug!(trades = envelope.data.len(), "trade frame published"),
        Err(e) => warn!(error = %e, "failed to publish trade frame"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct CollectingPublisher {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl CollectingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
            })
        }

        fn decoded(&self) -> Vec<Envelope> {
            self.frames
                .lock()
                .iter()
                .map(|bytes| wire::decode(bytes).expect("published frame must decode"))
                .collect()
        }
    }

    #[async_trait]
    impl FramePublisher for CollectingPublisher {
        async fn publish(&self, payload: &[u8]) -> Result<()> {
            self.frames.lock().push(payload.to_vec());
            Ok(())
        }
    }

    fn trade_frame(price: f64) -> String {
        serde_json::json!({
            "type": "trade",
            "data": [{"c": [], "p": price, "s": "AAPL", "t": 1_704_207_000_000i64, "v": 10.0}]
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn latest_wins_throttle_publishes_newest_frame_only() {
        let publisher = CollectingPublisher::new();
        let (tx, rx) = watch::channel::<Option<String>>(None);
        let worker = tokio::spawn(run_throttle_worker(
            rx,
            publisher.clone() as Arc<dyn FramePublisher>,
            Duration::from_secs(1),
        ));

        // Frames at t = 0.0 s, 0.3 s, 0.7 s.
        tx.send(Some(trade_frame(100.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(Some(trade_frame(101.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        tx.send(Some(trade_frame(102.0))).unwrap();

        // Let the worker pass the 1 s mark.
        tokio::time::sleep(Duration::from_millis(400)).await;

        let envelopes = publisher.decoded();
        assert_eq!(envelopes.len(), 1, "exactly one frame within the window");
        assert!((envelopes[0].data[0].price - 102.0).abs() < f64::EPSILON);

        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_publish_per_second() {
        let publisher = CollectingPublisher::new();
        let (tx, rx) = watch::channel::<Option<String>>(None);
        let worker = tokio::spawn(run_throttle_worker(
            rx,
            publisher.clone() as Arc<dyn FramePublisher>,
            Duration::from_secs(1),
        ));

        // A fresh frame every 100 ms for 3.5 s.
        for i in 0..35 {
            tx.send(Some(trade_frame(100.0 + i as f64))).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let count = publisher.decoded().len();
        assert!(count <= 3, "published {count} frames in 3.5 s");
        assert!(count >= 2, "throttle stalled: {count} frames in 3.5 s");

        drop(tx);
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let publisher = CollectingPublisher::new();
        let (tx, rx) = watch::channel::<Option<String>>(None);
        let worker = tokio::spawn(run_throttle_worker(
            rx,
            publisher.clone() as Arc<dyn FramePublisher>,
            Duration::from_secs(1),
        ));

        tx.send(Some("not json at all".to_string())).unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert!(publisher.decoded().is_empty());

        drop(tx);
        worker.await.unwrap();
    }
}
