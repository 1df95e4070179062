pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;

use serde::Serialize;

use crate::model::Candle;

/// A technical analysis indicator computed over a close-price series.
///
/// Prices must be in ascending chronological order (oldest first).
/// Computation is total: input shorter than `required_candles` produces
/// empty output, never an error.
pub trait Indicator: Send + Sync {
    type Output;

    /// Unique name of this indicator (e.g., "rsi", "macd").
    fn name(&self) -> &'static str;

    /// Minimum number of prices required to produce at least one output value.
    fn required_candles(&self) -> usize;

    fn calculate(&self, prices: &[f64]) -> Self::Output;
}

/// Indicator output anchored to the price series it was computed from.
///
/// `start` is the index into the source series of the first value, so
/// `values[k]` belongs to source index `start + k`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    start: usize,
    values: Vec<f64>,
}

impl Series {
    pub fn new(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Source index one past the last value.
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[allow(dead_code)]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at source index `index`, if this series covers it.
    pub fn get(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.start)
            .and_then(|k| self.values.get(k).copied())
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Iterate `(source_index, value)` pairs.
    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(k, &v)| (self.start + k, v))
    }
}

/// Extract close prices from a slice of candles.
pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
