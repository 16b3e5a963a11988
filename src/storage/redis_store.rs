// =============================================================================
// KV adapter — hot daily aggregates in Redis
// =============================================================================
//
// Keys follow `daily_agg:{symbol}:{YYYY-MM-DD}` and hold a hash that mirrors
// the `daily_aggregates` columns (minus created_at/updated_at).  Every write
// refreshes a 30-day TTL, which bounds how long an unpromoted aggregate can
// linger after the processor stops.
// =============================================================================

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::config::RedisConfig;
use crate::types::{format_trade_ts, DailyAggregate, QueuedTrade};

/// Key prefix for hot daily aggregates.
pub const DAILY_AGG_PREFIX: &str = "daily_agg";

/// TTL refreshed on every aggregate write: 30 days.
pub const DAILY_AGG_TTL_SECS: i64 = 30 * 24 * 3600;

/// Build the KV key for a `(symbol, date)` aggregate.
pub fn daily_agg_key(symbol: &str, date: NaiveDate) -> String {
    format!("{DAILY_AGG_PREFIX}:{symbol}:{}", date.format("%Y-%m-%d"))
}

/// Parse `(symbol, date)` back out of a KV key.
pub fn parse_daily_agg_key(key: &str) -> Result<(String, NaiveDate)> {
    let mut parts = key.splitn(3, ':');
    let prefix = parts.next().unwrap_or_default();
    let symbol = parts.next().unwrap_or_default();
    let date_str = parts.next().unwrap_or_default();

    if prefix != DAILY_AGG_PREFIX || symbol.is_empty() || date_str.is_empty() {
        bail!("malformed daily aggregate key: {key}");
    }
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("malformed date in daily aggregate key: {key}"))?;
    Ok((symbol.to_string(), date))
}

/// Redis-backed store for hot daily aggregates.
pub struct AggregateStore {
    conn: ConnectionManager,
}

impl AggregateStore {
    pub async fn connect(cfg: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(cfg.url())
            .with_context(|| format!("invalid Redis URL {}", cfg.url()))?;
        let conn = ConnectionManager::new(client)
            .await
            .with_context(|| format!("failed to connect to Redis at {}", cfg.url()))?;
        info!(url = %cfg.url(), "Redis connection established");
        Ok(Self { conn })
    }

    /// Apply a batch of trades to their daily aggregates in one pipelined
    /// round-trip.
    ///
    /// Per trade: the three counters are incremented, `first_trade_time` is
    /// written first-wins, `last_trade_time` last-wins, and the TTL is
    /// refreshed.  The increments are commutative, so reordering within a
    /// batch cannot corrupt the aggregate.
    pub async fn apply_batch(&self, batch: &[QueuedTrade]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for trade in batch {
            let key = daily_agg_key(&trade.symbol, trade.trade_ts.date_naive());
            let ts = format_trade_ts(trade.trade_ts);

            pipe.cmd("HINCRBYFLOAT")
                .arg(&key)
                .arg("total_volume")
                .arg(trade.volume)
                .ignore();
            pipe.cmd("HINCRBYFLOAT")
                .arg(&key)
                .arg("total_amount")
                .arg(trade.amount)
                .ignore();
            pipe.cmd("HINCRBY").arg(&key).arg("trade_count").arg(1).ignore();
            pipe.cmd("HSETNX")
                .arg(&key)
                .arg("first_trade_time")
                .arg(&ts)
                .ignore();
            pipe.cmd("HSET")
                .arg(&key)
                .arg("last_trade_time")
                .arg(&ts)
                .ignore();
            pipe.cmd("EXPIRE").arg(&key).arg(DAILY_AGG_TTL_SECS).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .context("daily aggregate pipeline failed")?;
        Ok(())
    }

    /// All keys currently holding a hot daily aggregate.
    pub async fn scan_daily_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut iter = conn
            .scan_match::<_, String>(format!("{DAILY_AGG_PREFIX}:*"))
            .await
            .context("daily aggregate key scan failed")?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    /// Read the hash behind a daily-aggregate key; `None` when the key is
    /// absent or empty.
    pub async fn read_aggregate(&self, key: &str) -> Result<Option<DailyAggregate>> {
        let (symbol, trade_date) = parse_daily_agg_key(key)?;

        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .with_context(|| format!("failed to read aggregate hash {key}"))?;
        if hash.is_empty() {
            return Ok(None);
        }

        let total_volume = parse_field(&hash, "total_volume")?;
        let total_amount = parse_field(&hash, "total_amount")?;
        let trade_count = hash
            .get("trade_count")
            .map(|v| v.parse::<i64>())
            .transpose()
            .with_context(|| format!("malformed trade_count in {key}"))?
            .unwrap_or(0);
        let first_trade_time = hash
            .get("first_trade_time")
            .with_context(|| format!("missing first_trade_time in {key}"))?
            .clone();
        let last_trade_time = hash
            .get("last_trade_time")
            .with_context(|| format!("missing last_trade_time in {key}"))?
            .clone();

        Ok(Some(DailyAggregate {
            symbol,
            trade_date,
            total_volume,
            total_amount,
            trade_count,
            first_trade_time,
            last_trade_time,
        }))
    }

    /// Convenience lookup by `(symbol, date)` for the aggregate query path.
    pub async fn get_aggregate(
        &self,
        symbol: &str,
        trade_date: NaiveDate,
    ) -> Result<Option<DailyAggregate>> {
        self.read_aggregate(&daily_agg_key(symbol, trade_date)).await
    }
}

fn parse_field(hash: &HashMap<String, String>, field: &str) -> Result<f64> {
    hash.get(field)
        .map(|v| v.parse::<f64>())
        .transpose()
        .with_context(|| format!("malformed {field} in aggregate hash"))
        .map(|v| v.unwrap_or(0.0))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let key = daily_agg_key("AAPL", date);
        assert_eq!(key, "daily_agg:AAPL:2024-01-02");
        let (symbol, parsed) = parse_daily_agg_key(&key).unwrap();
        assert_eq!(symbol, "AAPL");
        assert_eq!(parsed, date);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(parse_daily_agg_key("daily_agg:AAPL").is_err());
        assert!(parse_daily_agg_key("other:AAPL:2024-01-02").is_err());
        assert!(parse_daily_agg_key("daily_agg:AAPL:not-a-date").is_err());
    }

    #[test]
    fn ttl_is_thirty_days() {
        assert_eq!(DAILY_AGG_TTL_SECS, 2_592_000);
    }
}
