// =============================================================================
// Process configuration — explicit structs built from the environment
// =============================================================================
//
// Each binary parses the environment exactly once at startup and passes the
// resulting struct down into its components.  Missing required variables are
// a startup error; nothing reads the environment after this point.
// =============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Kafka connection settings shared by the producer and the consumer.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// `host:port` bootstrap address.
    pub bootstrap: String,
    pub topic: String,
}

impl KafkaConfig {
    fn from_env(default_topic: Option<&str>) -> Result<Self> {
        let server = require("KAFKA_SERVER")?;
        let port = require("KAFKA_PORT")?;
        let topic = match default_topic {
            Some(def) => var_or("KAFKA_TOPIC_NAME", def),
            None => require("KAFKA_TOPIC_NAME")?,
        };
        Ok(Self {
            bootstrap: format!("{server}:{port}"),
            topic,
        })
    }
}

/// Cassandra connection settings for the `market` keyspace.
#[derive(Debug, Clone)]
pub struct CassandraConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl CassandraConfig {
    fn from_env_required() -> Result<Self> {
        Ok(Self {
            host: require("CASSANDRA_HOST")?,
            username: require("CASSANDRA_USERNAME")?,
            password: require("CASSANDRA_PASSWORD")?,
        })
    }

    fn from_env_defaulted() -> Self {
        Self {
            host: var_or("CASSANDRA_HOST", "cassandra"),
            username: var_or("CASSANDRA_USERNAME", "cassandra"),
            password: var_or("CASSANDRA_PASSWORD", "cassandra"),
        }
    }
}

/// Redis connection settings for the hot daily-aggregate store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl RedisConfig {
    fn from_env() -> Result<Self> {
        let port = var_or("REDIS_PORT", "6379")
            .parse::<u16>()
            .context("REDIS_PORT is not a valid port number")?;
        Ok(Self {
            host: var_or("REDIS_HOST", "redis"),
            port,
        })
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Postgres connection settings for the fundamentals store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PostgresConfig {
    fn from_env() -> Result<Self> {
        let port = var_or("POSTGRES_PORT", "5432")
            .parse::<u16>()
            .context("POSTGRES_PORT is not a valid port number")?;
        Ok(Self {
            host: var_or("POSTGRES_HOST", "localhost"),
            port,
            database: var_or("POSTGRES_DATABASE", "stock_dashboard"),
            user: var_or("POSTGRES_USER", "admin"),
            password: var_or("POSTGRES_PASSWORD", "password"),
        })
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

// =============================================================================
// Per-process configs
// =============================================================================

/// Configuration for the realtime trade producer.
#[derive(Debug, Clone)]
pub struct TradeProducerConfig {
    pub api_token: String,
    pub kafka: KafkaConfig,
    pub tickers: Vec<String>,
    pub validate_tickers: bool,
}

impl TradeProducerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_token: require("FINNHUB_API_TOKEN_TRADES")?,
            kafka: KafkaConfig::from_env(None)?,
            tickers: parse_ticker_list(&require("FINNHUB_STOCKS_TICKERS")?)?,
            validate_tickers: require("FINNHUB_VALIDATE_TICKERS")? == "1",
        })
    }
}

/// Configuration for the realtime news producer.
#[derive(Debug, Clone)]
pub struct NewsProducerConfig {
    pub api_token: String,
    pub cassandra: CassandraConfig,
    pub tickers: Vec<String>,
}

impl NewsProducerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_token: require("FINNHUB_API_TOKEN_NEWS")?,
            cassandra: CassandraConfig::from_env_required()?,
            tickers: parse_ticker_list(&require("FINNHUB_STOCKS_TICKERS")?)?,
        })
    }
}

/// Configuration for the stream processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub kafka: KafkaConfig,
    pub cassandra: CassandraConfig,
    pub redis: RedisConfig,
    /// Maximum trades per Redis flush.
    pub batch_size: usize,
    /// Maximum age of a non-empty batch before it is flushed.
    pub batch_interval: Duration,
    /// How often the hot aggregates are promoted into Cassandra.
    pub daily_persist_interval: Duration,
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self> {
        let batch_size = var_or("BATCH_SIZE", "100")
            .parse::<usize>()
            .context("BATCH_SIZE is not a valid integer")?;
        let batch_interval = var_or("BATCH_INTERVAL", "10")
            .parse::<u64>()
            .context("BATCH_INTERVAL is not a valid number of seconds")?;
        let daily_persist_interval = var_or("DAILY_PERSIST_INTERVAL", "300")
            .parse::<u64>()
            .context("DAILY_PERSIST_INTERVAL is not a valid number of seconds")?;

        Ok(Self {
            kafka: KafkaConfig::from_env(Some("market"))?,
            cassandra: CassandraConfig::from_env_defaulted(),
            redis: RedisConfig::from_env()?,
            batch_size,
            batch_interval: Duration::from_secs(batch_interval),
            daily_persist_interval: Duration::from_secs(daily_persist_interval),
        })
    }
}

/// Default watchlist for the fundamentals synchronizer.
const DEFAULT_SYNC_SYMBOLS: &str = "AAPL,MSFT,GOOGL,AMZN,TSLA,META,NVDA,AVGO,CRM,ORCL,\
                                    NFLX,ADBE,AMD,INTC,PYPL,CSCO,QCOM,TXN,AMAT,PLTR";

/// Configuration for the fundamentals synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_key: String,
    pub postgres: PostgresConfig,
    pub symbols: Vec<String>,
    /// Fallback job selection when no CLI argument is given.
    pub sync_type: Option<String>,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require("ALPHA_VANTAGE_API_KEY")?,
            postgres: PostgresConfig::from_env()?,
            symbols: parse_ticker_list(&var_or("STOCKS_TICKERS", DEFAULT_SYNC_SYMBOLS))?,
            sync_type: std::env::var("SYNC_TYPE").ok().filter(|s| !s.is_empty()),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing required environment variable: {name}"),
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse a ticker list that is either a JSON array (`["AAPL","MSFT"]`) or a
/// comma-separated string (`AAPL,MSFT`).  Anything else is rejected.
pub fn parse_ticker_list(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    let tickers: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str::<Vec<String>>(raw)
            .context("ticker list looks like a JSON array but does not parse as one")?
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    } else {
        raw.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    };

    if tickers.is_empty() {
        bail!("ticker list is empty");
    }
    Ok(tickers)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_list_comma_separated() {
        let t = parse_ticker_list("AAPL, MSFT ,GOOGL").unwrap();
        assert_eq!(t, vec!["AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn ticker_list_json_array() {
        let t = parse_ticker_list(r#"["AAPL", "MSFT"]"#).unwrap();
        assert_eq!(t, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn ticker_list_rejects_malformed_json() {
        assert!(parse_ticker_list(r#"["AAPL", 42]"#).is_err());
        assert!(parse_ticker_list("[not json").is_err());
    }

    #[test]
    fn ticker_list_rejects_empty() {
        assert!(parse_ticker_list("").is_err());
        assert!(parse_ticker_list(" , ,").is_err());
        assert!(parse_ticker_list("[]").is_err());
    }

    #[test]
    fn redis_url_shape() {
        let cfg = RedisConfig {
            host: "redis".into(),
            port: 6379,
        };
        assert_eq!(cfg.url(), "redis://redis:6379");
    }

    #[test]
    fn postgres_url_shape() {
        let cfg = PostgresConfig {
            host: "db".into(),
            port: 5432,
            database: "stock_dashboard".into(),
            user: "admin".into(),
            password: "secret".into(),
        };
        assert_eq!(cfg.url(), "postgres://admin:secret@db:5432/stock_dashboard");
    }
}
