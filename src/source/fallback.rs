use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::future::BoxFuture;
use tracing::warn;

use crate::error::SourceError;
use crate::model::{Candle, TimeFrame};
use crate::source::MarketSource;

/// Tries `primary` first and switches to `secondary` when it fails.
/// An empty candle history from `primary` counts as a failure.
pub struct FallbackSource {
    primary: Box<dyn MarketSource>,
    secondary: Box<dyn MarketSource>,
}

impl FallbackSource {
    pub fn new(primary: Box<dyn MarketSource>, secondary: Box<dyn MarketSource>) -> Self {
        Self { primary, secondary }
    }
}

impl MarketSource for FallbackSource {
    fn name(&self) -> &'static str {
        self.primary.name()
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
            match self
                .primary
                .fetch_candles(&symbol, timeframe, start, end)
                .await
            {
                Ok(candles) if !candles.is_empty() => return Ok(candles),
                Ok(_) => warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "primary returned no candles, falling back"
                ),
                Err(e) => warn!(
                    error = ?e,
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "candle fetch failed, falling back"
                ),
            }

            self.secondary
                .fetch_candles(&symbol, timeframe, start, end)
                .await
                .map_err(|e| e.attach(format!("{} also failed", self.primary.name())))
        })
    }

    fn fetch_price(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let error = match self.primary.fetch_price(&symbol).await {
                Ok(price) => return Ok(price),
                Err(e) => e,
            };
            warn!(
                error = ?error,
                primary = self.primary.name(),
                secondary = self.secondary.name(),
                "price fetch failed, falling back"
            );

            self.secondary
                .fetch_price(&symbol)
                .await
                .map_err(|e| e.attach(format!("{} also failed", self.primary.name())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Fixed responses for exercising the fallback order.
    struct StubSource {
        name: &'static str,
        candles: Option<Vec<Candle>>,
        price: Option<f64>,
    }

    impl StubSource {
        fn failing(name: &'static str) -> Box<dyn MarketSource> {
            Box::new(Self {
                name,
                candles: None,
                price: None,
            })
        }

        fn serving(name: &'static str, candles: Vec<Candle>, price: f64) -> Box<dyn MarketSource> {
            Box::new(Self {
                name,
                candles: Some(candles),
                price: Some(price),
            })
        }

        fn failure(&self) -> Report<SourceError> {
            Report::new(SourceError::Request {
                service: self.name.into(),
            })
        }
    }

    impl MarketSource for StubSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: TimeFrame,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
            Box::pin(async move { self.candles.clone().ok_or_else(|| self.failure()) })
        }

        fn fetch_price(&self, _symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>> {
            Box::pin(async move { self.price.ok_or_else(|| self.failure()) })
        }
    }

    fn candle(close: f64) -> Candle {
        Candle {
            time: DateTime::from_timestamp_millis(1_704_067_200_000).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    async fn candles_from(source: &FallbackSource) -> Result<Vec<Candle>, Report<SourceError>> {
        let end = Utc::now();
        source
            .fetch_candles("BTCUSDT", TimeFrame::Hour1, end - Duration::days(7), end)
            .await
    }

    #[tokio::test]
    async fn primary_result_is_used_when_available() {
        let source = FallbackSource::new(
            StubSource::serving("binance", vec![candle(1.0)], 10.0),
            StubSource::serving("coingecko", vec![candle(2.0)], 20.0),
        );
        assert_eq!(candles_from(&source).await.unwrap()[0].close, 1.0);
        assert_eq!(source.fetch_price("BTCUSDT").await.unwrap(), 10.0);
        assert_eq!(source.name(), "binance");
    }

    #[tokio::test]
    async fn primary_failure_switches_to_secondary() {
        let source = FallbackSource::new(
            StubSource::failing("binance"),
            StubSource::serving("coingecko", vec![candle(2.0)], 20.0),
        );
        assert_eq!(candles_from(&source).await.unwrap()[0].close, 2.0);
        assert_eq!(source.fetch_price("BTCUSDT").await.unwrap(), 20.0);
    }

    #[tokio::test]
    async fn empty_primary_history_switches_to_secondary() {
        let source = FallbackSource::new(
            StubSource::serving("binance", Vec::new(), 10.0),
            StubSource::serving("coingecko", vec![candle(2.0), candle(3.0)], 20.0),
        );
        assert_eq!(candles_from(&source).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn both_failing_is_error() {
        let source =
            FallbackSource::new(StubSource::failing("binance"), StubSource::failing("coingecko"));
        assert!(candles_from(&source).await.is_err());
        assert!(source.fetch_price("BTCUSDT").await.is_err());
    }
}
