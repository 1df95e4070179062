use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, Series};

/// Arithmetic mean of each `period`-wide window.
///
/// Output length is `prices.len() - period + 1`; empty when `period` is zero
/// or longer than the input.
pub fn moving_average(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }
    prices
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Population standard deviation (divide by N) of `values` around `mean`.
pub fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// EMA seeded with the simple mean of the first `period` prices.
///
/// Output length is `prices.len() - period + 1`; empty when `period` is zero
/// or longer than the input.
pub fn exponential_moving_average(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    let mut results = Vec::with_capacity(prices.len() - period + 1);
    results.push(ema);

    for &price in &prices[period..] {
        ema = price * k + ema * (1.0 - k);
        results.push(ema);
    }

    results
}

/// Simple Moving Average.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for Sma {
    type Output = Series;

    fn name(&self) -> &'static str {
        "sma"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, prices: &[f64]) -> Series {
        Series::new(self.period - 1, moving_average(prices, self.period))
    }
}
