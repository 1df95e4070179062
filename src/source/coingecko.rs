use std::collections::HashMap;
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

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Synthetic high/low spread around each sampled price.
const HIGH_LOW_SPREAD: f64 = 0.001;

/// Exchange quote assets and the CoinGecko `vs_currency` they price in.
const QUOTE_CURRENCIES: &[(&str, &str)] = &[
    ("USDT", "usd"),
    ("USDC", "usd"),
    ("BUSD", "usd"),
    ("FDUSD", "usd"),
    ("USD", "usd"),
    ("EUR", "eur"),
    ("GBP", "gbp"),
    ("JPY", "jpy"),
    ("TRY", "try"),
    ("BRL", "brl"),
    ("BTC", "btc"),
    ("ETH", "eth"),
];

fn coin_id(base: &str) -> Option<&'static str> {
    match base {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "BNB" => Some("binancecoin"),
        "SOL" => Some("solana"),
        "XRP" => Some("ripple"),
        "DOGE" => Some("dogecoin"),
        "ADA" => Some("cardano"),
        "AVAX" => Some("avalanche-2"),
        "DOT" => Some("polkadot"),
        "LINK" => Some("chainlink"),
        "LTC" => Some("litecoin"),
        "TRX" => Some("tron"),
        "ATOM" => Some("cosmos"),
        "XLM" => Some("stellar"),
        "BCH" => Some("bitcoin-cash"),
        _ => None,
    }
}

/// Split an exchange pair such as `BTCUSDT` into a CoinGecko coin id and
/// `vs_currency` (`("bitcoin", "usd")`).
fn resolve_pair(symbol: &str) -> Option<(&'static str, &'static str)> {
    let symbol = symbol.to_ascii_uppercase();
    QUOTE_CURRENCIES.iter().find_map(|&(quote, vs)| {
        let base = symbol.strip_suffix(quote)?;
        coin_id(base).map(|id| (id, vs))
    })
}

fn unknown_pair(symbol: &str) -> Report<SourceError> {
    Report::new(SourceError::Request {
        service: "coingecko".into(),
    })
    .attach(format!("no CoinGecko coin for symbol {symbol}"))
}

/// CoinGecko public API: `market_chart` history and `simple/price`.
///
/// History arrives as bare `[time, price]` samples, so candles are
/// synthesized: open is the previous sample, high/low are ±0.1% of the
/// price and volume comes from the matching `total_volumes` entry.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl CoinGeckoSource {
    pub fn with_base_url(base_url: &str) -> Self {
        // free tier allows roughly 10-30 calls/min
        let quota = Quota::per_minute(nonzero!(10u32));
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
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await
            .change_context(SourceError::Request {
                service: "coingecko".into(),
            })
            .attach_with(|| format!("url: {url}"))?;

        if !response.status().is_success() {
            return Err(Report::new(SourceError::Request {
                service: "coingecko".into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        response
            .json()
            .await
            .change_context(SourceError::ResponseParse {
                service: "coingecko".into(),
            })
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::with_base_url(COINGECKO_BASE_URL)
    }
}

impl MarketSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    /// CoinGecko picks its own granularity for ranges under 90 days, so
    /// only a daily timeframe is forwarded as `interval=daily`.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let (id, vs_currency) = resolve_pair(&symbol).ok_or_else(|| unknown_pair(&symbol))?;
            let days = (end - start).num_days().max(1);

            let mut params = vec![
                ("vs_currency", vs_currency.to_owned()),
                ("days", days.to_string()),
            ];
            if timeframe == TimeFrame::Day1 {
                params.push(("interval", "daily".to_owned()));
            }

            let chart: MarketChart = self
                .get(&format!("/coins/{id}/market_chart"), &params)
                .await?;
            let candles = chart.into_candles()?;

            info!(
                symbol = %symbol,
                coin = id,
                days,
                fetched = candles.len(),
                "coingecko candle fetch complete"
            );

            Ok(candles)
        })
    }

    fn fetch_price(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let (id, vs_currency) = resolve_pair(&symbol).ok_or_else(|| unknown_pair(&symbol))?;
            let body: SimplePrice = self
                .get(
                    "/simple/price",
                    &[("ids", id.to_owned()), ("vs_currencies", vs_currency.to_owned())],
                )
                .await?;
            body.price(id, vs_currency)
        })
    }
}

// ── REST response types ───────────────────────────────────────────────────────

/// `GET /coins/{id}/market_chart` body. Each entry is `[time_ms, value]`.
#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<[f64; 2]>,
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>,
}

impl MarketChart {
    fn into_candles(self) -> Result<Vec<Candle>, Report<SourceError>> {
        let mut previous: Option<f64> = None;
        self.prices
            .iter()
            .enumerate()
            .map(|(i, &[time_ms, price])| -> Result<Candle, Report<SourceError>> {
                let time = DateTime::from_timestamp_millis(time_ms as i64).ok_or_else(|| {
                    Report::new(SourceError::ResponseParse {
                        service: "coingecko".into(),
                    })
                    .attach(format!("timestamp out of range: {time_ms}"))
                })?;
                let open = previous.unwrap_or(price);
                previous = Some(price);

                Ok(Candle {
                    time,
                    open,
                    high: price * (1.0 + HIGH_LOW_SPREAD),
                    low: price * (1.0 - HIGH_LOW_SPREAD),
                    close: price,
                    volume: self.total_volumes.get(i).map_or(0.0, |v| v[1]),
                })
            })
            .collect()
    }
}

/// `GET /simple/price` body: `{ "bitcoin": { "usd": 42000.0 } }`
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct SimplePrice(HashMap<String, HashMap<String, f64>>);

impl SimplePrice {
    fn price(&self, id: &str, vs_currency: &str) -> Result<f64, Report<SourceError>> {
        self.0
            .get(id)
            .and_then(|quotes| quotes.get(vs_currency))
            .copied()
            .ok_or_else(|| {
                Report::new(SourceError::ResponseParse {
                    service: "coingecko".into(),
                })
                .attach(format!("no {vs_currency} price for {id}"))
            })
    }
}
