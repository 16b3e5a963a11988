// =============================================================================
// Shared types used across the Aurora market pipeline
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A trade waiting on the batch queue for the daily-aggregate path.
#[derive(Debug, Clone)]
pub struct QueuedTrade {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub trade_ts: DateTime<Utc>,
    /// `price * volume`, precomputed at enqueue time.
    pub amount: f64,
}

impl QueuedTrade {
    pub fn new(symbol: impl Into<String>, price: f64, volume: f64, trade_ts: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume,
            trade_ts,
            amount: price * volume,
        }
    }
}

/// Per-symbol, per-date daily aggregate as held in Redis and persisted to the
/// `daily_aggregates` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub total_volume: f64,
    pub total_amount: f64,
    pub trade_count: i64,
    pub first_trade_time: String,
    pub last_trade_time: String,
}

/// Which store answered a daily-aggregate lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateSource {
    Redis,
    Cassandra,
}

impl std::fmt::Display for AggregateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redis => write!(f, "redis"),
            Self::Cassandra => write!(f, "cassandra"),
        }
    }
}

/// A daily aggregate together with the tier it was read from.
#[derive(Debug, Clone, Serialize)]
pub struct DailyAggregateView {
    #[serde(flatten)]
    pub aggregate: DailyAggregate,
    pub source: AggregateSource,
}

/// A single news item from the realtime news stream, shaped for the
/// wide-column `news` table.
#[derive(Debug, Clone)]
pub struct NewsRecord {
    /// The vendor `related` field, stored verbatim (may be a comma-separated
    /// ticker list).
    pub symbol: String,
    pub category: String,
    pub datetime: DateTime<Utc>,
    pub headline: String,
    pub news_id: i64,
    pub image: String,
    pub source: String,
    pub summary: String,
    pub url: String,
}

/// Render trade timestamps in a fixed-width form so that lexicographic
/// comparison of the stored strings agrees with temporal order.
pub fn format_trade_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Parse a timestamp previously written by [`format_trade_ts`].
pub fn parse_trade_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%:z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a conditions list in its literal textual form, e.g. `['1', '12']`.
///
/// The `trade_conditions` column is read downstream as an opaque string, so
/// the exact rendering is part of the storage contract.
pub fn render_conditions(conditions: &[String]) -> String {
    let inner: Vec<String> = conditions.iter().map(|c| format!("'{c}'")).collect();
    format!("[{}]", inner.join(", "))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn queued_trade_precomputes_amount() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let t = QueuedTrade::new("AAPL", 10.0, 3.0, ts);
        assert!((t.amount - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trade_ts_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        let b = Utc
            .timestamp_millis_opt(a.timestamp_millis() + 123)
            .unwrap();
        let sa = format_trade_ts(a);
        let sb = format_trade_ts(b);
        assert_eq!(sa.len(), sb.len());
        assert_eq!(sa.len(), "2024-01-02T09:30:00.000000+00:00".len());
    }

    #[test]
    fn trade_ts_lexicographic_order_matches_temporal() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 2, 15, 59, 59).unwrap();
        assert!(format_trade_ts(early) < format_trade_ts(late));
    }

    #[test]
    fn trade_ts_roundtrip() {
        let ts = Utc.timestamp_millis_opt(1_704_207_000_123).unwrap();
        let parsed = parse_trade_ts(&format_trade_ts(ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn conditions_render_as_literal_list() {
        assert_eq!(render_conditions(&[]), "[]");
        assert_eq!(
            render_conditions(&["1".to_string(), "12".to_string()]),
            "['1', '12']"
        );
    }
}
