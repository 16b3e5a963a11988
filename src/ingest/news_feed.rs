// =============================================================================
// News feed — WebSocket ingestion straight into the wide-column store
// =============================================================================
//
// Unlike the trade feed there is no throttle: news is sparse, so every item
// in a `type == "news"` frame is persisted individually.  Anything else on
// the socket is discarded.
//
// Runs until the stream disconnects or an error occurs, then returns so that
// the caller (the binary) can handle reconnection.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::{FINNHUB_WS_URL, SUBSCRIBE_PACING};
use crate::config::NewsProducerConfig;
use crate::storage::MarketStore;
use crate::types::NewsRecord;

/// Connect, subscribe the configured tickers to the news channel, and persist
/// news items until the socket closes.
pub async fn run_news_feed(cfg: &NewsProducerConfig, store: &MarketStore) -> Result<()> {
    let url = format!("{FINNHUB_WS_URL}?token={}", cfg.api_token);
    info!(tickers = cfg.tickers.len(), "connecting to news WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to news WebSocket")?;
    info!("news WebSocket connected");

    let (mut write, mut read) = ws_stream.split();

    for ticker in &cfg.tickers {
        let frame = serde_json::json!({"type": "subscribe-news", "symbol": ticker}).to_string();
        write
            .send(Message::Text(frame))
            .await
            .with_context(|| format!("failed to subscribe to news for {ticker}"))?;
        info!(ticker, "subscribed to news");
        tokio::time::sleep(SUBSCRIBE_PACING).await;
    }

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let message: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "failed to decode news frame");
                        continue;
                    }
                };

                for record in extract_news_records(&message) {
                    match store.insert_news(&record, Utc::now()).await {
                        Ok(()) => {
                            debug!(symbol = %record.symbol, headline = %record.headline, "news stored")
                        }
                        Err(e) => warn!(error = %e, "failed to store news item"),
                    }
                }
            }
            Some(Ok(Message::Close(_))) => {
                warn!("news WebSocket closed by server");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "news WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!("news WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Pull the news items out of a frame.  Frames whose `type` is not `news`
/// yield nothing.
fn extract_news_records(message: &Value) -> Vec<NewsRecord> {
    if message.get("type").and_then(Value::as_str) != Some("news") {
        return Vec::new();
    }

    message
        .get("data")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_news_item).collect())
        .unwrap_or_default()
}

fn parse_news_item(item: &Value) -> Option<NewsRecord> {
    let millis = item.get("datetime").and_then(Value::as_i64).unwrap_or(0);
    let datetime = Utc.timestamp_millis_opt(millis).single()?;

    Some(NewsRecord {
        symbol: text_field(item, "related"),
        category: text_field(item, "category"),
        datetime,
        headline: text_field(item, "headline"),
        news_id: item.get("id").and_then(Value::as_i64).unwrap_or(0),
        image: text_field(item, "image"),
        source: text_field(item, "source"),
        summary: text_field(item, "summary"),
        url: text_field(item, "url"),
    })
}

fn text_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_news_frames_yield_nothing() {
        let message = json!({
            "type": "trade",
            "data": [{"related": "AAPL", "headline": "not news"}]
        });
        assert!(extract_news_records(&message).is_empty());
    }

    #[test]
    fn news_items_are_extracted_per_item() {
        let message = json!({
            "type": "news",
            "data": [
                {
                    "related": "AAPL,MSFT",
                    "category": "technology",
                    "datetime": 1_704_207_000_000i64,
                    "headline": "Chips everywhere",
                    "id": 42,
                    "image": "https://example.com/i.png",
                    "source": "Wire",
                    "summary": "Summary text",
                    "url": "https://example.com/article"
                },
                {"related": "TSLA", "datetime": 1_704_207_001_000i64, "id": 43}
            ]
        });

        let records = extract_news_records(&message);
        assert_eq!(records.len(), 2);
        // The `related` field is stored verbatim, comma-separated or not.
        assert_eq!(records[0].symbol, "AAPL,MSFT");
        assert_eq!(records[0].news_id, 42);
        assert_eq!(records[0].datetime.timestamp_millis(), 1_704_207_000_000);
        assert_eq!(records[1].headline, "");
    }

    #[test]
    fn missing_datetime_defaults_to_epoch() {
        let message = json!({
            "type": "news",
            "data": [{"related": "AAPL", "headline": "no timestamp"}]
        });
        let records = extract_news_records(&message);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].datetime.timestamp_millis(), 0);
    }
}
