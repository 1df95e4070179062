use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::info;

use crate::error::SourceError;
use crate::model::{Candle, TimeFrame};
use crate::source::MarketSource;

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
const MAX_CANDLES_PER_REQUEST: usize = 1000;

pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl BinanceSource {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        // klines cost weight 2 against a 6000/min budget; 10 req/s leaves headroom
        let quota = Quota::per_second(nonzero!(10u32));
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Report<SourceError>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .change_context(SourceError::Request {
                service: "binance".into(),
            })
            .attach_with(|| format!("url: {url}"))?;

        if !response.status().is_success() {
            return Err(Report::new(SourceError::Request {
                service: "binance".into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        response
            .json()
            .await
            .change_context(SourceError::ResponseParse {
                service: "binance".into(),
            })
    }
}

impl Default for BinanceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketSource for BinanceSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let params = [
                ("symbol", symbol.clone()),
                ("interval", timeframe.as_str().to_owned()),
                ("startTime", start.timestamp_millis().to_string()),
                ("endTime", end.timestamp_millis().to_string()),
                ("limit", MAX_CANDLES_PER_REQUEST.to_string()),
            ];

            let raw: Vec<BinanceKlineRow> = self.get("/api/v3/klines", &params).await?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                fetched = raw.len(),
                "binance candle fetch complete"
            );

            raw.into_iter()
                .map(BinanceKlineRow::into_candle)
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn fetch_price(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let ticker: BinanceTickerPrice = self
                .get("/api/v3/ticker/price", &[("symbol", symbol)])
                .await?;
            ticker.price()
        })
    }
}

// ── REST response types ───────────────────────────────────────────────────────

fn parse_f64(s: &str) -> Result<f64, Report<SourceError>> {
    s.parse::<f64>()
        .change_context(SourceError::ResponseParse {
            service: "binance".into(),
        })
        .attach_with(|| format!("value: {s:?}"))
}

/// Binance kline row: 12-element array
/// [open_time, open, high, low, close, volume, close_time, ...]
#[derive(Debug, Deserialize)]
struct BinanceKlineRow(
    i64,                        // 0: open_time (ms)
    String,                     // 1: open
    String,                     // 2: high
    String,                     // 3: low
    String,                     // 4: close
    String,                     // 5: volume
    #[allow(dead_code)] i64,    // 6: close_time
    #[allow(dead_code)] String, // 7: quote asset volume
    #[allow(dead_code)] i64,    // 8: number of trades
    #[allow(dead_code)] String, // 9: taker buy base volume
    #[allow(dead_code)] String, // 10: taker buy quote volume
    #[allow(dead_code)] String, // 11: ignore
);

impl BinanceKlineRow {
    fn into_candle(self) -> Result<Candle, Report<SourceError>> {
        let time = DateTime::from_timestamp_millis(self.0).ok_or_else(|| {
            Report::new(SourceError::ResponseParse {
                service: "binance".into(),
            })
            .attach(format!("open_time out of range: {}", self.0))
        })?;

        Ok(Candle {
            time,
            open: parse_f64(&self.1)?,
            high: parse_f64(&self.2)?,
            low: parse_f64(&self.3)?,
            close: parse_f64(&self.4)?,
            volume: parse_f64(&self.5)?,
        })
    }
}

/// `GET /api/v3/ticker/price` body: `{ "symbol": "BTCUSDT", "price": "42000.01" }`
#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

impl BinanceTickerPrice {
    fn price(&self) -> Result<f64, Report<SourceError>> {
        parse_f64(&self.price)
    }
}
