use async_trait::async_trait;
use chrono::DateTime;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use super::MarketDataProvider;
use crate::error::ScanError;
use crate::models::{Candle, Timeframe};
use crate::Result;

pub const BINANCE_API_BASE: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: usize = 1000;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 1200;
const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 10;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Positional kline row: open time, OHLCV as decimal strings, then fields we skip
#[derive(Debug, Deserialize)]
struct KlineRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Binance spot REST client for kline data
///
/// Cloneable; clones share the rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_config(
            BINANCE_API_BASE,
            DEFAULT_REQUESTS_PER_MINUTE,
            DEFAULT_MAX_RETRIES,
        )
    }

    pub fn with_config(base_url: &str, requests_per_minute: u32, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScanError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            ScanError::Configuration("binance.requests_per_minute must be positive".to_string())
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn klines_url(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            timeframe.as_str(),
            limit.clamp(1, MAX_KLINES_PER_REQUEST)
        )
    }

    /// Rate-limited GET with retry on network errors, 429 and 5xx
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            self.rate_limiter.until_ready().await;

            let error = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status.as_u16() != 429 && !status.is_server_error() {
                        // Other 4xx (bad symbol, bad interval) - don't retry
                        let body = response.text().await.unwrap_or_default();
                        let detail = serde_json::from_str::<BinanceErrorBody>(&body)
                            .map(|e| format!("{} (code {})", e.msg, e.code))
                            .unwrap_or(body);
                        return Err(ScanError::Provider(format!(
                            "Binance API error ({}): {}",
                            status, detail
                        )));
                    }

                    ScanError::Provider(format!("Binance returned {}", status))
                }
                Err(e) => ScanError::from(e),
            };

            if attempt < self.max_retries {
                let backoff = self.initial_backoff * 2_u32.pow(attempt - 1);
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    self.max_retries,
                    error,
                    backoff
                );
                sleep(backoff).await;
            }
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| ScanError::Provider("All retry attempts failed".to_string())))
    }

    /// Fetch the most recent `limit` klines, oldest first
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, timeframe, limit);
        let response = self.make_request(&url).await?;
        let rows: Vec<KlineRow> = response.json().await?;

        let candles = rows
            .into_iter()
            .map(parse_kline)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            count = candles.len(),
            "Fetched klines"
        );

        Ok(candles)
    }
}

fn parse_kline(row: KlineRow) -> Result<Candle> {
    let timestamp = DateTime::from_timestamp_millis(row.0)
        .ok_or_else(|| ScanError::Provider(format!("Invalid kline open time: {}", row.0)))?;

    Ok(Candle {
        timestamp,
        open: parse_price(&row.1, "open")?,
        high: parse_price(&row.2, "high")?,
        low: parse_price(&row.3, "low")?,
        close: parse_price(&row.4, "close")?,
        volume: parse_price(&row.5, "volume")?,
    })
}

fn parse_price(raw: &str, field: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| ScanError::Provider(format!("Invalid {} value: {:?}", field, raw)))
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const KLINES_BODY: &str = r#"[
        [1700000000000, "100.0", "101.5", "99.5", "101.0", "12.5", 1700000059999, "1262.5", 42, "6.0", "606.0", "0"],
        [1700000060000, "101.0", "102.0", "100.5", "101.8", "8.25", 1700000119999, "834.1", 30, "4.0", "408.0", "0"]
    ]"#;

    fn client(base_url: &str) -> BinanceClient {
        BinanceClient::with_config(base_url, 600, 3)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_klines_url() {
        let client = BinanceClient::new().unwrap();
        assert_eq!(
            client.klines_url("btcusdt", Timeframe::M15, 100),
            "https://api.binance.com/api/v3/klines?symbol=BTCUSDT&interval=15m&limit=100"
        );
        assert!(client
            .klines_url("BTCUSDT", Timeframe::H4, 5000)
            .ends_with("limit=1000"));
    }

    #[test]
    fn test_zero_rate_limit_is_configuration_error() {
        let result = BinanceClient::with_config(BINANCE_API_BASE, 0, 3);
        assert!(matches!(result, Err(ScanError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_get_klines_parses_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(KLINES_BODY)
            .create_async()
            .await;

        let candles = client(&server.url())
            .get_candles("BTCUSDT", Timeframe::M1, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 100.0);
        assert_eq!(candles[0].high, 101.5);
        assert_eq!(candles[1].close, 101.8);
        assert_eq!(candles[1].volume, 8.25);
        assert_eq!(candles[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client(&server.url())
            .get_candles("NOPE", Timeframe::M1, 10)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ScanError::Provider(_)));
        assert!(err.to_string().contains("Invalid symbol."));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let result = client(&server.url())
            .get_candles("BTCUSDT", Timeframe::M1, 10)
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_price_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[[1700000000000, "abc", "1", "1", "1", "1", 1700000059999, "1", 1, "1", "1", "0"]]"#,
            )
            .create_async()
            .await;

        let err = client(&server.url())
            .get_candles("BTCUSDT", Timeframe::M1, 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid open value"));
    }
}
