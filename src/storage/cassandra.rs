// =============================================================================
// Wide-column adapter — raw trades, running averages, daily aggregates, news
// =============================================================================
//
// All hot-path statements are prepared once at connect time.  Cassandra
// INSERTs are upserts, which is exactly what the daily-aggregate promotion
// relies on.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use scylla::prepared_statement::PreparedStatement;
use scylla::{Session, SessionBuilder};
use tracing::info;
use uuid::Uuid;

use crate::config::CassandraConfig;
use crate::types::{format_trade_ts, parse_trade_ts, DailyAggregate, NewsRecord};

/// Keyspace holding every realtime table.
const KEYSPACE: &str = "market";

/// Session plus the prepared statements for the market keyspace.
pub struct MarketStore {
    session: Session,
    insert_trade: PreparedStatement,
    insert_average: PreparedStatement,
    upsert_daily_aggregate: PreparedStatement,
    insert_news: PreparedStatement,
    select_daily_aggregate: PreparedStatement,
}

impl MarketStore {
    pub async fn connect(cfg: &CassandraConfig) -> Result<Self> {
        let session = SessionBuilder::new()
            .known_node(&cfg.host)
            .user(&cfg.username, &cfg.password)
            .build()
            .await
            .with_context(|| format!("failed to connect to Cassandra at {}", cfg.host))?;

        session
            .use_keyspace(KEYSPACE, false)
            .await
            .with_context(|| format!("failed to switch to keyspace {KEYSPACE}"))?;

        let insert_trade = session
            .prepare(
                "INSERT INTO trades (uuid, symbol, trade_conditions, price, volume, \
                 trade_timestamp, ingest_timestamp) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .await
            .context("failed to prepare trades insert")?;

        let insert_average = session
            .prepare(
                "INSERT INTO running_averages_15_sec (uuid, symbol, price_volume_multiply, \
                 ingest_timestamp) VALUES (?, ?, ?, ?)",
            )
            .await
            .context("failed to prepare running averages insert")?;

        let upsert_daily_aggregate = session
            .prepare(
                "INSERT INTO daily_aggregates (symbol, trade_date, total_volume, total_amount, \
                 trade_count, first_trade_time, last_trade_time, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .await
            .context("failed to prepare daily aggregates upsert")?;

        let insert_news = session
            .prepare(
                "INSERT INTO news (uuid, symbol, category, datetime, headline, news_id, \
                 image, source, summary, url, ingest_timestamp) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .await
            .context("failed to prepare news insert")?;

        let select_daily_aggregate = session
            .prepare(
                "SELECT total_volume, total_amount, trade_count, first_trade_time, \
                 last_trade_time FROM daily_aggregates WHERE symbol = ? AND trade_date = ?",
            )
            .await
            .context("failed to prepare daily aggregates select")?;

        info!(host = %cfg.host, keyspace = KEYSPACE, "Cassandra session established");

        Ok(Self {
            session,
            insert_trade,
            insert_average,
            upsert_daily_aggregate,
            insert_news,
            select_daily_aggregate,
        })
    }

    /// Persist one raw trade.  `conditions` is the literal textual rendering
    /// of the condition list.
    pub async fn insert_trade(
        &self,
        uuid: Uuid,
        symbol: &str,
        conditions: &str,
        price: f64,
        volume: f64,
        trade_timestamp: DateTime<Utc>,
        ingest_timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.session
            .execute_unpaged(
                &self.insert_trade,
                (
                    uuid,
                    symbol,
                    conditions,
                    price,
                    volume,
                    trade_timestamp,
                    ingest_timestamp,
                ),
            )
            .await
            .with_context(|| format!("failed to insert trade for {symbol}"))?;
        Ok(())
    }

    /// Persist one 15-second running-average sample.
    pub async fn insert_average(
        &self,
        uuid: Uuid,
        symbol: &str,
        price_volume_multiply: f64,
        ingest_timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.session
            .execute_unpaged(
                &self.insert_average,
                (uuid, symbol, price_volume_multiply, ingest_timestamp),
            )
            .await
            .with_context(|| format!("failed to insert running average for {symbol}"))?;
        Ok(())
    }

    /// Promote one hot daily aggregate into the cold store.
    pub async fn upsert_daily_aggregate(
        &self,
        aggregate: &DailyAggregate,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let first = parse_trade_ts(&aggregate.first_trade_time)
            .with_context(|| format!("unparsable first_trade_time: {}", aggregate.first_trade_time))?;
        let last = parse_trade_ts(&aggregate.last_trade_time)
            .with_context(|| format!("unparsable last_trade_time: {}", aggregate.last_trade_time))?;

        self.session
            .execute_unpaged(
                &self.upsert_daily_aggregate,
                (
                    aggregate.symbol.as_str(),
                    aggregate.trade_date,
                    aggregate.total_volume,
                    aggregate.total_amount,
                    aggregate.trade_count,
                    first,
                    last,
                    created_at,
                    updated_at,
                ),
            )
            .await
            .with_context(|| format!("failed to upsert daily aggregate for {}", aggregate.symbol))?;
        Ok(())
    }

    /// Persist one realtime news item.
    pub async fn insert_news(&self, record: &NewsRecord, ingest_timestamp: DateTime<Utc>) -> Result<()> {
        self.session
            .execute_unpaged(
                &self.insert_news,
                (
                    Uuid::new_v4(),
                    record.symbol.as_str(),
                    record.category.as_str(),
                    record.datetime,
                    record.headline.as_str(),
                    record.news_id,
                    record.image.as_str(),
                    record.source.as_str(),
                    record.summary.as_str(),
                    record.url.as_str(),
                    ingest_timestamp,
                ),
            )
            .await
            .with_context(|| format!("failed to insert news for {}", record.symbol))?;
        Ok(())
    }

    /// Point-read of a promoted daily aggregate (the cold half of the
    /// aggregate query path).
    pub async fn fetch_daily_aggregate(
        &self,
        symbol: &str,
        trade_date: NaiveDate,
    ) -> Result<Option<DailyAggregate>> {
        let result = self
            .session
            .execute_unpaged(&self.select_daily_aggregate, (symbol, trade_date))
            .await
            .with_context(|| format!("failed to read daily aggregate for {symbol}"))?;

        let rows = result
            .into_rows_result()
            .context("daily aggregate read returned no row set")?;

        let row = rows
            .maybe_first_row::<(f64, f64, i64, DateTime<Utc>, DateTime<Utc>)>()
            .context("daily aggregate row has unexpected shape")?;

        Ok(row.map(|(total_volume, total_amount, trade_count, first, last)| DailyAggregate {
            symbol: symbol.to_string(),
            trade_date,
            total_volume,
            total_amount,
            trade_count,
            first_trade_time: format_trade_ts(first),
            last_trade_time: format_trade_ts(last),
        }))
    }
}
