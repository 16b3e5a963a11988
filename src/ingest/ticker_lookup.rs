// =============================================================================
// Ticker lookup — vendor symbol-search validation
// =============================================================================

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Resolves tickers against the vendor's symbol-search endpoint.  Used by the
/// trade producer to skip tickers the vendor does not know before
/// subscribing.
pub struct TickerLookup {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl TickerLookup {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build ticker lookup HTTP client")?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// True when the search results contain an exact symbol match.
    pub async fn exists(&self, ticker: &str) -> Result<bool> {
        let url = format!("{}/search?q={}&token={}", self.base_url, ticker, self.token);

        let body: Value = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("symbol lookup request for {ticker} failed"))?
            .json()
            .await
            .with_context(|| format!("symbol lookup response for {ticker} is not JSON"))?;

        let found = symbol_in_results(&body, ticker);
        debug!(ticker, found, "ticker lookup complete");
        Ok(found)
    }
}

fn symbol_in_results(body: &Value, ticker: &str) -> bool {
    body.get("result")
        .and_then(Value::as_array)
        .is_some_and(|results| {
            results
                .iter()
                .any(|entry| entry.get("symbol").and_then(Value::as_str) == Some(ticker))
        })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_symbol_match_is_required() {
        let body = json!({
            "count": 2,
            "result": [
                {"symbol": "AAPL", "description": "Apple Inc"},
                {"symbol": "AAPL.SW", "description": "Apple Inc (Swiss)"}
            ]
        });
        assert!(symbol_in_results(&body, "AAPL"));
        assert!(!symbol_in_results(&body, "AAPQ"));
    }

    #[test]
    fn missing_result_array_is_not_found() {
        assert!(!symbol_in_results(&json!({"count": 0}), "AAPL"));
    }
}
