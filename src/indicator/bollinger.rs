use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ma::{moving_average, standard_deviation};
use crate::indicator::{Indicator, Series};

/// Middle (SMA), upper and lower bands, all starting at source index `period - 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerSeries {
    pub middle_band: Series,
    pub upper_band: Series,
    pub lower_band: Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandPoint {
    /// Relative band width `(upper - lower) / middle`; `None` when the middle band is zero.
    pub fn width(&self) -> Option<f64> {
        if self.middle == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / self.middle)
    }
}

impl BollingerSeries {
    pub fn latest(&self) -> Option<BandPoint> {
        Some(BandPoint {
            upper: self.upper_band.last()?,
            middle: self.middle_band.last()?,
            lower: self.lower_band.last()?,
        })
    }
}

/// Bands at `std_dev_factor` population standard deviations around the SMA.
///
/// The deviation is taken per window against that window's own mean.
pub fn bollinger_bands(prices: &[f64], period: usize, std_dev_factor: f64) -> BollingerSeries {
    let start = period.saturating_sub(1);
    let middle = moving_average(prices, period);

    let (upper, lower): (Vec<f64>, Vec<f64>) = middle
        .iter()
        .enumerate()
        .map(|(i, &mean)| {
            let std_dev = standard_deviation(&prices[i..i + period], mean);
            (mean + std_dev_factor * std_dev, mean - std_dev_factor * std_dev)
        })
        .unzip();

    BollingerSeries {
        middle_band: Series::new(start, middle),
        upper_band: Series::new(start, upper),
        lower_band: Series::new(start, lower),
    }
}

pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        if !(std_dev_multiplier.is_finite() && std_dev_multiplier > 0.0) {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be finite and > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerSeries;

    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn required_candles(&self) -> usize {
        self.period
    }

    fn calculate(&self, prices: &[f64]) -> BollingerSeries {
        bollinger_bands(prices, self.period, self.std_dev_multiplier)
    }
}
