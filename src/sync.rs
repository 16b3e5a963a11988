// =============================================================================
// Fundamentals synchronizer — scheduled vendor pulls into Postgres
// =============================================================================
//
// Four jobs, one per process invocation.  Counts in a job result index
// endpoints, not rows: a job that fetched twenty symbols but upserted them in
// one statement still records a single success or failure per endpoint.
// =============================================================================

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::US::Eastern;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::storage::FundamentalsStore;
use crate::vendor::client::OutputSize;
use crate::vendor::models::{NewsArticle, NewsStockRow};
use crate::vendor::VendorClient;

/// Articles requested per daily news pull.
const NEWS_LIMIT: u32 = 200;

/// Which sync job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SyncType {
    DailyPrices,
    DailyNews,
    Weekly,
    Quarterly,
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyPrices => write!(f, "daily-prices"),
            Self::DailyNews => write!(f, "daily-news"),
            Self::Weekly => write!(f, "weekly"),
            Self::Quarterly => write!(f, "quarterly"),
        }
    }
}

impl FromStr for SyncType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily-prices" => Ok(Self::DailyPrices),
            "daily-news" => Ok(Self::DailyNews),
            "weekly" => Ok(Self::Weekly),
            "quarterly" => Ok(Self::Quarterly),
            other => anyhow::bail!("unknown sync type: {other}"),
        }
    }
}

/// Endpoint-level outcome of one job.
#[derive(Debug, Default, Clone, Serialize)]
pub struct JobResult {
    pub success_count: u32,
    pub error_count: u32,
    pub errors: Vec<String>,
}

impl JobResult {
    fn record_success(&mut self) {
        self.success_count += 1;
    }

    fn record_error(&mut self, endpoint: &str) {
        self.error_count += 1;
        self.errors.push(endpoint.to_string());
    }
}

/// Wrapper around a job run, shaped for the CLI's JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sync_type: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn failure(sync_type: &str, error: impl std::fmt::Display) -> Self {
        Self {
            sync_type: sync_type.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            results: None,
            error: Some(error.to_string()),
        }
    }

    /// The process exits non-zero when this is true.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
            || self
                .results
                .as_ref()
                .is_some_and(|r| r.error_count > 0)
    }
}

pub struct SyncService {
    client: VendorClient,
    store: FundamentalsStore,
    symbols: Vec<String>,
}

impl SyncService {
    pub fn new(client: VendorClient, store: FundamentalsStore, symbols: Vec<String>) -> Self {
        Self {
            client,
            store,
            symbols,
        }
    }

    pub async fn run_sync(&self, sync_type: SyncType) -> SyncReport {
        info!(%sync_type, symbols = self.symbols.len(), "starting sync");

        let results = match sync_type {
            SyncType::DailyPrices => self.sync_daily_prices().await,
            SyncType::DailyNews => self.sync_daily_news().await,
            SyncType::Weekly => self.sync_weekly().await,
            SyncType::Quarterly => self.sync_quarterly().await,
        };

        info!(
            %sync_type,
            success = results.success_count,
            errors = results.error_count,
            "sync complete"
        );

        SyncReport {
            sync_type: sync_type.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            results: Some(results),
            error: None,
        }
    }

    // -------------------------------------------------------------------------
    // daily-prices
    // -------------------------------------------------------------------------

    async fn sync_daily_prices(&self) -> JobResult {
        let mut result = JobResult::default();
        let mut rows = Vec::new();
        let mut fetch_failed = false;

        for symbol in &self.symbols {
            match self.client.daily_prices(symbol, OutputSize::Compact).await {
                Some(prices) => rows.extend(prices),
                None => {
                    warn!(symbol, "no daily price data fetched");
                    fetch_failed = true;
                }
            }
        }

        let mut saved = false;
        if rows.is_empty() {
            fetch_failed = true;
        } else {
            match self.store.upsert_daily_prices(&rows).await {
                Ok(()) => saved = true,
                Err(e) => {
                    error!(error = %e, "daily price upsert failed");
                    fetch_failed = true;
                }
            }
        }

        if fetch_failed {
            result.record_error("TIME_SERIES_DAILY");
        }
        if saved {
            result.record_success();
        }
        result
    }

    // -------------------------------------------------------------------------
    // daily-news
    // -------------------------------------------------------------------------

    async fn sync_daily_news(&self) -> JobResult {
        let mut result = JobResult::default();

        let time_from = news_window_start(Utc::now());
        let Some(articles) = self
            .client
            .news_sentiment(&self.symbols, Some(&time_from), NEWS_LIMIT)
            .await
        else {
            result.record_error("NEWS_SENTIMENT");
            return result;
        };
        if articles.is_empty() {
            result.record_error("NEWS_SENTIMENT");
            return result;
        }

        let url_to_id = match self.store.upsert_news_articles(&articles).await {
            Ok(map) => map,
            Err(e) => {
                error!(error = %e, "news article upsert failed");
                result.record_error("NEWS_SENTIMENT");
                return result;
            }
        };

        let links = build_news_stock_rows(&articles, &url_to_id, &self.symbols);
        if links.is_empty() {
            result.record_error("NEWS_SENTIMENT");
            return result;
        }

        match self.store.upsert_news_stocks(&links).await {
            Ok(()) => result.record_success(),
            Err(e) => {
                error!(error = %e, "news-stock link upsert failed");
                result.record_error("NEWS_SENTIMENT");
            }
        }
        result
    }

    // -------------------------------------------------------------------------
    // weekly
    // -------------------------------------------------------------------------

    async fn sync_weekly(&self) -> JobResult {
        let mut result = JobResult::default();

        // 1. Stock listings.
        match self.client.stock_listings(&self.symbols).await {
            Some(listings) => match self.store.upsert_stocks(&listings).await {
                Ok(()) => result.record_success(),
                Err(e) => {
                    error!(error = %e, "stock listing upsert failed");
                    result.record_error("LISTING_STATUS");
                }
            },
            None => result.record_error("LISTING_STATUS"),
        }

        // 2. Company overviews.
        let mut overviews = Vec::new();
        let mut fetch_failed = false;
        for symbol in &self.symbols {
            match self.client.company_overview(symbol).await {
                Some(overview) => overviews.push(overview),
                None => {
                    warn!(symbol, "no company overview fetched");
                    fetch_failed = true;
                }
            }
        }

        let mut saved = false;
        if overviews.is_empty() {
            fetch_failed = true;
        } else {
            match self.store.upsert_company_overview(&overviews).await {
                Ok(()) => saved = true,
                Err(e) => {
                    error!(error = %e, "company overview upsert failed");
                    fetch_failed = true;
                }
            }
        }

        if fetch_failed {
            result.record_error("OVERVIEW");
        }
        if saved {
            result.record_success();
        }
        result
    }

    // -------------------------------------------------------------------------
    // quarterly
    // -------------------------------------------------------------------------

    async fn sync_quarterly(&self) -> JobResult {
        let mut result = JobResult::default();

        // 1. Income statements.
        let mut income_rows = Vec::new();
        let mut income_failed = false;
        for symbol in &self.symbols {
            match self.client.income_statement(symbol).await {
                Some(reports) => income_rows.extend(reports.into_rows()),
                None => income_failed = true,
            }
        }
        record_statement_outcome(
            &mut result,
            "INCOME_STATEMENT",
            income_failed,
            self.store.upsert_income_statements(&income_rows).await,
            income_rows.len(),
        );

        // 2. Balance sheets.
        let mut balance_rows = Vec::new();
        let mut balance_failed = false;
        for symbol in &self.symbols {
            match self.client.balance_sheet(symbol).await {
                Some(reports) => balance_rows.extend(reports.into_rows()),
                None => balance_failed = true,
            }
        }
        record_statement_outcome(
            &mut result,
            "BALANCE_SHEET",
            balance_failed,
            self.store.upsert_balance_sheets(&balance_rows).await,
            balance_rows.len(),
        );

        // 3. Cash flows.
        let mut cash_rows = Vec::new();
        let mut cash_failed = false;
        for symbol in &self.symbols {
            match self.client.cash_flow(symbol).await {
                Some(reports) => cash_rows.extend(reports.into_rows()),
                None => cash_failed = true,
            }
        }
        record_statement_outcome(
            &mut result,
            "CASH_FLOW",
            cash_failed,
            self.store.upsert_cash_flows(&cash_rows).await,
            cash_rows.len(),
        );

        result
    }
}

/// Fold one statement endpoint's fetch + upsert outcome into the job result.
fn record_statement_outcome(
    result: &mut JobResult,
    endpoint: &str,
    mut fetch_failed: bool,
    upsert: anyhow::Result<()>,
    row_count: usize,
) {
    let mut saved = false;
    if row_count == 0 {
        fetch_failed = true;
    } else {
        match upsert {
            Ok(()) => saved = true,
            Err(e) => {
                error!(endpoint, error = %e, "statement upsert failed");
                fetch_failed = true;
            }
        }
    }

    if fetch_failed {
        result.record_error(endpoint);
    }
    if saved {
        result.record_success();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Start of the daily news window: yesterday 09:00 US/Eastern, rendered in
/// UTC as `YYYYMMDDTHHMM`.
pub fn news_window_start(now_utc: DateTime<Utc>) -> String {
    let yesterday_eastern = now_utc.with_timezone(&Eastern) - Duration::days(1);
    let target_naive = yesterday_eastern
        .date_naive()
        .and_hms_opt(9, 0, 0)
        .expect("09:00 is a valid time");

    let target_utc = match Eastern.from_local_datetime(&target_naive).earliest() {
        Some(t) => t.with_timezone(&Utc),
        // 09:00 never lands inside a DST gap, but fall back to a naive UTC
        // interpretation rather than fail the job.
        None => DateTime::from_naive_utc_and_offset(target_naive, Utc),
    };

    target_utc.format("%Y%m%dT%H%M").to_string()
}

/// Build `news_stocks` rows for an article set: one row per (article,
/// ticker) pair whose ticker is on the watchlist and whose article landed an
/// id in the upsert.
pub fn build_news_stock_rows(
    articles: &[NewsArticle],
    url_to_id: &HashMap<String, i64>,
    watchlist: &[String],
) -> Vec<NewsStockRow> {
    let mut rows = Vec::new();
    for article in articles {
        let Some(&news_id) = url_to_id.get(&article.url) else {
            continue;
        };
        for sentiment in &article.ticker_sentiment {
            if !watchlist.iter().any(|w| w == &sentiment.ticker) {
                continue;
            }
            rows.push(NewsStockRow {
                news_id,
                symbol: sentiment.ticker.clone(),
                relevance_score: sentiment.relevance_score,
                sentiment_score: sentiment.sentiment_score,
                sentiment_label: sentiment.sentiment_label.clone(),
            });
        }
    }
    rows
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::models::TickerSentiment;

    fn article(url: &str, tickers: &[&str]) -> NewsArticle {
        NewsArticle {
            title: Some("headline".into()),
            url: url.to_string(),
            time_published: None,
            authors: vec![],
            summary: None,
            source: None,
            category_within_source: None,
            source_domain: None,
            overall_sentiment_score: Some(0.1),
            overall_sentiment_label: Some("Neutral".into()),
            ticker_sentiment: tickers
                .iter()
                .map(|t| TickerSentiment {
                    ticker: t.to_string(),
                    relevance_score: Some(0.5),
                    sentiment_score: Some(0.2),
                    sentiment_label: Some("Bullish".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn news_links_filter_to_watchlist() {
        let articles = vec![article("https://example.com/a", &["AAPL", "MSFT", "ZZZZ"])];
        let url_to_id = HashMap::from([("https://example.com/a".to_string(), 7i64)]);
        let watchlist = vec!["AAPL".to_string(), "MSFT".to_string()];

        let rows = build_news_stock_rows(&articles, &url_to_id, &watchlist);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.news_id == 7));
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[1].symbol, "MSFT");
    }

    #[test]
    fn news_links_skip_articles_without_an_id() {
        let articles = vec![article("https://example.com/missing", &["AAPL"])];
        let rows = build_news_stock_rows(&articles, &HashMap::new(), &["AAPL".to_string()]);
        assert!(rows.is_empty());
    }

    #[test]
    fn news_window_summer_offset() {
        // July 10th 12:00 UTC: Eastern is UTC-4, so yesterday 09:00 ET is
        // 13:00 UTC on the 9th.
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        assert_eq!(news_window_start(now), "20240709T1300");
    }

    #[test]
    fn news_window_winter_offset() {
        // January 15th 12:00 UTC: Eastern is UTC-5, so yesterday 09:00 ET is
        // 14:00 UTC on the 14th.
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(news_window_start(now), "20240114T1400");
    }

    #[test]
    fn sync_type_round_trips_through_str() {
        for (text, value) in [
            ("daily-prices", SyncType::DailyPrices),
            ("daily-news", SyncType::DailyNews),
            ("weekly", SyncType::Weekly),
            ("quarterly", SyncType::Quarterly),
        ] {
            assert_eq!(SyncType::from_str(text).unwrap(), value);
            assert_eq!(value.to_string(), text);
        }
        assert!(SyncType::from_str("hourly").is_err());
    }

    #[test]
    fn report_failure_detection() {
        let mut ok = JobResult::default();
        ok.record_success();
        let report = SyncReport {
            sync_type: "weekly".into(),
            timestamp: Utc::now().to_rfc3339(),
            results: Some(ok),
            error: None,
        };
        assert!(!report.is_failure());

        let mut bad = JobResult::default();
        bad.record_success();
        bad.record_error("OVERVIEW");
        let report = SyncReport {
            sync_type: "weekly".into(),
            timestamp: Utc::now().to_rfc3339(),
            results: Some(bad),
            error: None,
        };
        assert!(report.is_failure());

        assert!(SyncReport::failure("weekly", "boom").is_failure());
    }
}
