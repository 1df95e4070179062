use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ma::exponential_moving_average;
use crate::indicator::{Indicator, Series};

/// MACD line, signal line and histogram, each anchored to the price series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub macd_line: Series,
    pub signal_line: Series,
    pub histogram: Series,
}

/// The three MACD values at a single index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdSeries {
    /// Values at the most recent index, if the histogram is non-empty.
    pub fn latest(&self) -> Option<MacdPoint> {
        let index = self.histogram.end().checked_sub(1)?;
        Some(MacdPoint {
            line: self.macd_line.get(index)?,
            signal: self.signal_line.get(index)?,
            histogram: self.histogram.get(index)?,
        })
    }
}

/// Compute MACD over `prices`.
///
/// The short EMA is trimmed by `long - short` values so both EMAs start at
/// source index `long - 1`. The signal line and histogram start a further
/// `signal - 1` values later. Short input yields empty series.
pub fn macd(prices: &[f64], short: usize, long: usize, signal: usize) -> MacdSeries {
    let line_start = long.max(short).saturating_sub(1);
    let signal_start = line_start + signal.saturating_sub(1);

    let ema_short = exponential_moving_average(prices, short);
    let ema_long = exponential_moving_average(prices, long);

    let offset = long.saturating_sub(short);
    let macd_line: Vec<f64> = ema_short
        .get(offset..)
        .unwrap_or_default()
        .iter()
        .zip(ema_long.iter())
        .map(|(s, l)| s - l)
        .collect();

    let signal_line = exponential_moving_average(&macd_line, signal);
    let histogram: Vec<f64> = macd_line
        .get(signal.saturating_sub(1)..)
        .unwrap_or_default()
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdSeries {
        macd_line: Series::new(line_start, macd_line),
        signal_line: Series::new(signal_start, signal_line),
        histogram: Series::new(signal_start, histogram),
    }
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Indicator for Macd {
    type Output = MacdSeries;

    fn name(&self) -> &'static str {
        "macd"
    }

    fn required_candles(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    fn calculate(&self, prices: &[f64]) -> MacdSeries {
        macd(
            prices,
            self.fast_period,
            self.slow_period,
            self.signal_period,
        )
    }
}
