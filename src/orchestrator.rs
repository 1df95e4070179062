use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, close_prices};
use crate::indicator::macd::MacdPoint;
use crate::model::{Candle, SentimentScore};
use crate::prediction::{Prediction, PredictionEngine};

const SHORT_TERM_CANDLES: usize = 96;
const MID_TERM_CANDLES: usize = 240;
const PANEL_FAST_SMA: usize = 7;
const PANEL_SLOW_SMA: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Horizon {
    Short,
    Mid,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Short, Horizon::Mid, Horizon::Long];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Mid => "mid",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tail sizes for the short and mid horizons. The long horizon always
/// uses the whole series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonWindows {
    pub short: usize,
    pub mid: usize,
}

impl Default for HorizonWindows {
    fn default() -> Self {
        Self {
            short: SHORT_TERM_CANDLES,
            mid: MID_TERM_CANDLES,
        }
    }
}

impl HorizonWindows {
    /// Requested tail length, or `None` for the full series.
    pub fn window_len(&self, horizon: Horizon) -> Option<usize> {
        match horizon {
            Horizon::Short => Some(self.short),
            Horizon::Mid => Some(self.mid),
            Horizon::Long => None,
        }
    }

    /// Tail slice of `candles` for `horizon`; the whole series when it is shorter
    /// than the requested window.
    pub fn slice<'a>(&self, candles: &'a [Candle], horizon: Horizon) -> &'a [Candle] {
        match self.window_len(horizon) {
            Some(len) => &candles[candles.len().saturating_sub(len)..],
            None => candles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonPrediction {
    pub horizon: Horizon,
    /// Number of candles the prediction was computed over.
    pub window_len: usize,
    pub prediction: Prediction,
}

/// Latest indicator values shown next to the predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorPanel {
    pub rsi: Option<f64>,
    pub macd: Option<MacdPoint>,
    pub sma7: Option<f64>,
    pub sma30: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub current_price: f64,
    /// Change from the first candle's open, in percent.
    pub price_change_pct: Option<f64>,
    pub total_volume: f64,
    pub candle_count: usize,
}

impl MarketSummary {
    pub fn from_candles(candles: &[Candle], current_price: f64) -> Self {
        let price_change_pct = candles
            .first()
            .map(|c| c.open)
            .filter(|open| *open != 0.0)
            .map(|open| (current_price - open) / open * 100.0);

        Self {
            current_price,
            price_change_pct,
            total_volume: candles.iter().map(|c| c.volume).sum(),
            candle_count: candles.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// One entry per horizon, in `Horizon::ALL` order.
    pub predictions: Vec<HorizonPrediction>,
    pub panel: IndicatorPanel,
    pub summary: MarketSummary,
    pub sentiment: SentimentScore,
}

impl Forecast {
    pub fn get(&self, horizon: Horizon) -> Option<&HorizonPrediction> {
        self.predictions.iter().find(|p| p.horizon == horizon)
    }
}

/// Runs the prediction engine over progressively larger tails of a series.
pub struct Orchestrator {
    engine: PredictionEngine,
    windows: HorizonWindows,
}

impl Orchestrator {
    pub fn new(engine: PredictionEngine, windows: HorizonWindows) -> Self {
        Self { engine, windows }
    }

    pub fn predict_horizon(
        &self,
        candles: &[Candle],
        horizon: Horizon,
        current_price: f64,
        sentiment: &SentimentScore,
    ) -> HorizonPrediction {
        let window = self.windows.slice(candles, horizon);
        let prediction = self.engine.predict(window, current_price, sentiment);

        debug!(
            horizon = %horizon,
            window_len = window.len(),
            trend = %prediction.trend,
            confidence = prediction.confidence,
            "horizon prediction computed"
        );

        HorizonPrediction {
            horizon,
            window_len: window.len(),
            prediction,
        }
    }

    pub fn forecast(
        &self,
        candles: &[Candle],
        current_price: f64,
        sentiment: &SentimentScore,
    ) -> Forecast {
        let predictions: Vec<HorizonPrediction> = Horizon::ALL
            .iter()
            .map(|&horizon| self.predict_horizon(candles, horizon, current_price, sentiment))
            .collect();

        let long_details = predictions
            .iter()
            .find(|p| p.horizon == Horizon::Long)
            .map(|p| &p.prediction.details);

        let prices = close_prices(candles);
        let panel = IndicatorPanel {
            rsi: long_details.and_then(|d| d.rsi),
            macd: long_details.and_then(|d| d.macd),
            sma7: latest_sma(&prices, PANEL_FAST_SMA),
            sma30: latest_sma(&prices, PANEL_SLOW_SMA),
        };

        Forecast {
            predictions,
            panel,
            summary: MarketSummary::from_candles(candles, current_price),
            sentiment: *sentiment,
        }
    }
}

fn latest_sma(prices: &[f64], period: usize) -> Option<f64> {
    Sma::new(period).ok().and_then(|sma| sma.calculate(prices).last())
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(PredictionEngine::default(), HorizonWindows::default())
    }
}
