pub mod binance;
pub mod coingecko;
pub mod fallback;
pub mod file;

use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{Candle, TimeFrame};

/// Supplier of historical candles and the live price.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketSource`).
pub trait MarketSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch candles in `[start, end]`, oldest first.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>>;

    /// Fetch the current traded price.
    fn fetch_price(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>>;
}
