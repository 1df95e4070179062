use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series};

/// RSI over a sliding window of the last `period` price changes.
///
/// Gains and losses are kept as running sums: each step adds the newest
/// delta, emits a value, then drops the delta `period` samples behind.
/// The first value belongs to source index `period`, so output length is
/// `prices.len() - period`. A window with no losses is defined as 100.
pub fn relative_strength_index(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() <= period {
        return Vec::new();
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    let mut results = Vec::with_capacity(prices.len() - period);

    for i in 1..prices.len() {
        let delta = prices[i] - prices[i - 1];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }

        if i >= period {
            results.push(rsi_value(gains, losses, period));

            let oldest = prices[i - period + 1] - prices[i - period];
            if oldest > 0.0 {
                gains -= oldest;
            } else {
                losses += oldest;
            }
        }
    }

    results
}

fn rsi_value(gains: f64, losses: f64, period: usize) -> f64 {
    // running sums can drift just below zero after many roll-offs
    if losses <= 0.0 {
        return 100.0;
    }
    let avg_gain = gains.max(0.0) / period as f64;
    let avg_loss = losses / period as f64;
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Relative Strength Index.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Indicator for Rsi {
    type Output = Series;

    fn name(&self) -> &'static str {
        "rsi"
    }

    fn required_candles(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, prices: &[f64]) -> Series {
        Series::new(self.period, relative_strength_index(prices, self.period))
    }
}
