use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::IndicatorError;
use crate::indicator::bollinger::{BandPoint, BollingerBands};
use crate::indicator::macd::{Macd, MacdPoint};
use crate::indicator::rsi::Rsi;
use crate::indicator::{Indicator, close_prices};
use crate::model::{Candle, SentimentScore};

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_POINTS: f64 = 20.0;
const RSI_CONFIDENCE_PER_POINT: f64 = 0.5;

const MACD_POINTS: f64 = 15.0;
const MACD_CONFIDENCE_SCALE: f64 = 1000.0;
const MACD_CONFIDENCE_CAP: f64 = 20.0;

const BAND_POINTS: f64 = 20.0;
const BAND_WIDTH_CAP: f64 = 0.1;
const BAND_CONFIDENCE_WEIGHT: f64 = 15.0;

const EXTREME_FEAR: u8 = 25;
const EXTREME_GREED: u8 = 75;
const SENTIMENT_POINTS: f64 = 25.0;
const SENTIMENT_CONFIDENCE_PER_POINT: f64 = 0.4;

const SCORE_LIMIT: f64 = 100.0;
const MIN_CONFIDENCE: f64 = 40.0;
const MAX_CONFIDENCE: f64 = 95.0;
/// Largest move a full-scale score maps to (5%).
const MAX_PREDICTED_CHANGE: f64 = 0.05;
const TREND_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    fn from_score(score: f64) -> Self {
        if score > TREND_THRESHOLD {
            Self::Bullish
        } else if score < -TREND_THRESHOLD {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Indicator readings behind a prediction. `None` marks a rule that was
/// skipped for lack of data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionDetails {
    pub rsi: Option<f64>,
    pub macd: Option<MacdPoint>,
    pub bollinger_band_width: Option<f64>,
    pub sentiment_value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_price: f64,
    /// Always within `[40, 95]`.
    pub confidence: f64,
    pub trend: Trend,
    pub details: PredictionDetails,
}

/// Latest indicator values for one price window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub macd: Option<MacdPoint>,
    pub bollinger: Option<BandPoint>,
    pub last_close: Option<f64>,
}

/// Heuristic weighted scoring over RSI, MACD, Bollinger Bands and market
/// sentiment. Holds only indicator parameters, so every call is a pure
/// function of its arguments.
pub struct PredictionEngine {
    rsi: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
}

impl PredictionEngine {
    pub fn new(rsi: Rsi, macd: Macd, bollinger: BollingerBands) -> Self {
        Self {
            rsi,
            macd,
            bollinger,
        }
    }

    /// Compute the latest indicator values for `prices`.
    pub fn indicators(&self, prices: &[f64]) -> IndicatorSet {
        let rsi = self.rsi.calculate(prices);
        let macd = self.macd.calculate(prices);
        let bands = self.bollinger.calculate(prices);

        for (indicator, required, series) in [
            (self.rsi.name(), self.rsi.required_candles(), &rsi),
            (self.macd.name(), self.macd.required_candles(), &macd.histogram),
            (self.bollinger.name(), self.bollinger.required_candles(), &bands.middle_band),
        ] {
            if series.is_empty() {
                let reason = IndicatorError::InsufficientData {
                    required,
                    available: prices.len(),
                };
                debug!(indicator, %reason, "rule skipped");
            } else {
                trace!(
                    indicator,
                    first_index = series.start(),
                    points = series.len(),
                    "indicator computed"
                );
            }
        }

        IndicatorSet {
            rsi: rsi.last(),
            macd: macd.latest(),
            bollinger: bands.latest(),
            last_close: prices.last().copied(),
        }
    }

    /// Predict the next move for a candle window.
    pub fn predict(
        &self,
        window: &[Candle],
        current_price: f64,
        sentiment: &SentimentScore,
    ) -> Prediction {
        let indicators = self.indicators(&close_prices(window));
        evaluate(&indicators, current_price, sentiment)
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(Rsi::default(), Macd::default(), BollingerBands::default())
    }
}

/// Score a set of indicator readings and map the score to a prediction.
pub fn evaluate(
    indicators: &IndicatorSet,
    current_price: f64,
    sentiment: &SentimentScore,
) -> Prediction {
    let mut score = 0.0;
    let mut confidence = 0.0;

    if let Some(rsi) = indicators.rsi {
        if rsi < RSI_OVERSOLD {
            score += RSI_POINTS;
        }
        if rsi > RSI_OVERBOUGHT {
            score -= RSI_POINTS;
        }
        confidence += (rsi - 50.0).abs() * RSI_CONFIDENCE_PER_POINT;
    }

    if let Some(macd) = indicators.macd {
        if macd.histogram > 0.0 {
            score += MACD_POINTS;
        } else if macd.histogram < 0.0 {
            score -= MACD_POINTS;
        }
        if let Some(close) = indicators.last_close.filter(|c| *c != 0.0) {
            confidence +=
                (macd.histogram.abs() / close.abs() * MACD_CONFIDENCE_SCALE).min(MACD_CONFIDENCE_CAP);
        }
    }

    let band_width = indicators.bollinger.and_then(|b| b.width());
    if let (Some(bands), Some(width), Some(close)) =
        (indicators.bollinger, band_width, indicators.last_close)
    {
        if close < bands.lower {
            score += BAND_POINTS;
        }
        if close > bands.upper {
            score -= BAND_POINTS;
        }
        confidence += (1.0 - width.min(BAND_WIDTH_CAP) * 10.0) * BAND_CONFIDENCE_WEIGHT;
    }

    if sentiment.value < EXTREME_FEAR {
        score += SENTIMENT_POINTS;
    }
    if sentiment.value > EXTREME_GREED {
        score -= SENTIMENT_POINTS;
    }
    confidence += (50.0 - f64::from(sentiment.value)).abs() * SENTIMENT_CONFIDENCE_PER_POINT;

    let score = score.clamp(-SCORE_LIMIT, SCORE_LIMIT);
    let confidence = confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

    let predicted_change = (score / SCORE_LIMIT) * MAX_PREDICTED_CHANGE;

    Prediction {
        predicted_price: current_price * (1.0 + predicted_change),
        confidence,
        trend: Trend::from_score(score),
        details: PredictionDetails {
            rsi: indicators.rsi,
            macd: indicators.macd,
            bollinger_band_width: band_width,
            sentiment_value: sentiment.value,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let base = Utc.timestamp_opt(1_704_067_200, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                time: base + Duration::minutes(15 * i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn neutral_set() -> IndicatorSet {
        IndicatorSet {
            rsi: Some(50.0),
            macd: Some(MacdPoint {
                line: 0.0,
                signal: 0.0,
                histogram: 0.0,
            }),
            bollinger: Some(BandPoint {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
            }),
            last_close: Some(100.0),
        }
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 42_000.0 + (i as f64 * 0.21).sin() * 900.0 + (i as f64 * 0.05).cos() * 300.0)
            .collect()
    }

    #[test]
    fn all_neutral_inputs_floor_confidence() {
        let prediction = evaluate(&neutral_set(), 100.0, &SentimentScore::neutral());
        assert_eq!(prediction.trend, Trend::Neutral);
        assert_eq!(prediction.confidence, 40.0);
        assert_eq!(prediction.predicted_price, 100.0);
    }

    #[test]
    fn oversold_signals_stack_bullish() {
        let set = IndicatorSet {
            rsi: Some(20.0),
            macd: Some(MacdPoint {
                line: 1.0,
                signal: 0.5,
                histogram: 0.5,
            }),
            bollinger: Some(BandPoint {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
            }),
            last_close: Some(85.0),
        };
        let prediction = evaluate(&set, 85.0, &SentimentScore::from_value(10));
        // 20 + 15 + 20 + 25 = 80 -> +4%
        assert_eq!(prediction.trend, Trend::Bullish);
        assert!((prediction.predicted_price - 85.0 * 1.04).abs() < 1e-9);
    }

    #[test]
    fn overbought_signals_stack_bearish() {
        let set = IndicatorSet {
            rsi: Some(85.0),
            macd: Some(MacdPoint {
                line: -1.0,
                signal: -0.2,
                histogram: -0.8,
            }),
            bollinger: Some(BandPoint {
                upper: 110.0,
                middle: 100.0,
                lower: 90.0,
            }),
            last_close: Some(115.0),
        };
        let prediction = evaluate(&set, 115.0, &SentimentScore::from_value(90));
        // -20 - 15 - 20 - 25 = -80 -> -4%
        assert_eq!(prediction.trend, Trend::Bearish);
        assert!((prediction.predicted_price - 115.0 * 0.96).abs() < 1e-9);
    }

    #[test]
    fn confidence_terms_accumulate() {
        let set = IndicatorSet {
            rsi: Some(80.0),
            macd: None,
            bollinger: Some(BandPoint {
                upper: 101.0,
                middle: 100.0,
                lower: 99.0,
            }),
            last_close: Some(100.0),
        };
        let prediction = evaluate(&set, 100.0, &SentimentScore::from_value(90));
        // rsi 30 * 0.5 = 15; width 0.02 -> (1 - 0.2) * 15 = 12; sentiment 40 * 0.4 = 16
        assert!((prediction.confidence - 43.0).abs() < 1e-9);
    }

    /// RSI 80, 2% band width and greed 90 contribute 15 + 12 + 16 = 43,
    /// so the MACD term shows above the confidence floor.
    fn with_macd(histogram: f64, last_close: f64) -> IndicatorSet {
        IndicatorSet {
            rsi: Some(80.0),
            macd: Some(MacdPoint {
                line: histogram,
                signal: 0.0,
                histogram,
            }),
            bollinger: Some(BandPoint {
                upper: 101.0,
                middle: 100.0,
                lower: 99.0,
            }),
            last_close: Some(last_close),
        }
    }

    #[test]
    fn macd_confidence_scales_with_histogram() {
        // 0.5 / 100 * 1000 = 5
        let prediction = evaluate(&with_macd(0.5, 100.0), 100.0, &SentimentScore::from_value(90));
        assert!((prediction.confidence - 48.0).abs() < 1e-9);

        let prediction = evaluate(&with_macd(-0.5, 100.0), 100.0, &SentimentScore::from_value(90));
        assert!((prediction.confidence - 48.0).abs() < 1e-9);
    }

    #[test]
    fn macd_confidence_capped_at_twenty() {
        let prediction = evaluate(&with_macd(500.0, 100.0), 100.0, &SentimentScore::from_value(90));
        assert!((prediction.confidence - 63.0).abs() < 1e-9);
    }

    #[test]
    fn macd_confidence_skipped_for_zero_close() {
        let prediction = evaluate(&with_macd(0.5, 0.0), 100.0, &SentimentScore::from_value(90));
        assert!((prediction.confidence - 43.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_and_change_stay_bounded() {
        let rsis = [None, Some(0.0), Some(25.0), Some(50.0), Some(75.0), Some(100.0)];
        let histograms = [None, Some(-500.0), Some(-0.01), Some(0.0), Some(0.01), Some(500.0)];
        let closes = [80.0, 95.0, 100.0, 105.0, 120.0];
        let sentiments = [0u8, 10, 24, 25, 50, 75, 76, 100];

        for rsi in rsis {
            for histogram in histograms {
                for close in closes {
                    for value in sentiments {
                        let set = IndicatorSet {
                            rsi,
                            macd: histogram.map(|h| MacdPoint {
                                line: h,
                                signal: 0.0,
                                histogram: h,
                            }),
                            bollinger: Some(BandPoint {
                                upper: 104.0,
                                middle: 100.0,
                                lower: 96.0,
                            }),
                            last_close: Some(close),
                        };
                        let p = evaluate(&set, 1000.0, &SentimentScore::from_value(value));
                        assert!((40.0..=95.0).contains(&p.confidence));
                        let change = p.predicted_price / 1000.0 - 1.0;
                        assert!((-0.05 - 1e-12..=0.05 + 1e-12).contains(&change));
                    }
                }
            }
        }
    }

    #[test]
    fn short_window_skips_indicator_rules() {
        let engine = PredictionEngine::default();
        let window = candles_from_closes(&wavy(10));
        let prediction = engine.predict(&window, 42_000.0, &SentimentScore::from_value(10));
        assert_eq!(prediction.details.rsi, None);
        assert_eq!(prediction.details.macd, None);
        assert_eq!(prediction.details.bollinger_band_width, None);
        // sentiment alone: +25 -> +1.25%
        assert_eq!(prediction.trend, Trend::Bullish);
        assert!((prediction.predicted_price - 42_000.0 * 1.0125).abs() < 1e-6);
    }

    #[test]
    fn empty_window_does_not_fail() {
        let engine = PredictionEngine::default();
        let prediction = engine.predict(&[], 100.0, &SentimentScore::neutral());
        assert_eq!(prediction.trend, Trend::Neutral);
        assert_eq!(prediction.confidence, 40.0);
        assert_eq!(prediction.predicted_price, 100.0);
    }

    #[test]
    fn macd_rule_skipped_below_its_window() {
        let engine = PredictionEngine::default();
        let prices = wavy(30);
        let set = engine.indicators(&prices);
        assert!(set.rsi.is_some());
        assert!(set.bollinger.is_some());
        assert!(set.macd.is_none());
    }

    #[test]
    fn full_window_populates_details() {
        let engine = PredictionEngine::default();
        let window = candles_from_closes(&wavy(96));
        let prediction = engine.predict(&window, 42_100.0, &SentimentScore::neutral());
        assert!(prediction.details.rsi.is_some());
        assert!(prediction.details.macd.is_some());
        assert!(prediction.details.bollinger_band_width.is_some());
        assert_eq!(prediction.details.sentiment_value, 50);
    }

    #[test]
    fn predict_is_idempotent() {
        let engine = PredictionEngine::default();
        let window = candles_from_closes(&wavy(240));
        let sentiment = SentimentScore::from_value(33);
        let first = engine.predict(&window, 41_800.0, &sentiment);
        let second = engine.predict(&window, 41_800.0, &sentiment);
        assert_eq!(first, second);
    }
}
