use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Candle sampling interval used when requesting history.
///
/// String representations match the Binance kline interval format (e.g. `"15m"`, `"1h"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrame {
    Min15,
    Hour1,
    Hour4,
    Day1,
}

impl TimeFrame {
    /// Parse an interval string into a `TimeFrame`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "15m" => Some(Self::Min15),
            "1h" => Some(Self::Hour1),
            "4h" => Some(Self::Hour4),
            "1d" => Some(Self::Day1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }

    /// Pick the sampling interval for a lookback window so that the
    /// history stays within a single kline page.
    pub fn for_lookback_days(days: u32) -> Self {
        match days {
            0..=1 => Self::Min15,
            2..=7 => Self::Hour1,
            8..=30 => Self::Hour4,
            _ => Self::Day1,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV bar. Series of candles are kept in ascending `time` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Fear & Greed bucket reported alongside a sentiment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentClass {
    #[serde(rename = "Extreme Fear")]
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    #[serde(rename = "Extreme Greed")]
    ExtremeGreed,
}

impl SentimentClass {
    /// Bucket a raw 0-100 index value.
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=24 => Self::ExtremeFear,
            25..=46 => Self::Fear,
            47..=54 => Self::Neutral,
            55..=75 => Self::Greed,
            _ => Self::ExtremeGreed,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Extreme Fear" => Some(Self::ExtremeFear),
            "Fear" => Some(Self::Fear),
            "Neutral" => Some(Self::Neutral),
            "Greed" => Some(Self::Greed),
            "Extreme Greed" => Some(Self::ExtremeGreed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExtremeFear => "Extreme Fear",
            Self::Fear => "Fear",
            Self::Neutral => "Neutral",
            Self::Greed => "Greed",
            Self::ExtremeGreed => "Extreme Greed",
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Market-mood index supplied by the sentiment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub value: u8,
    pub classification: SentimentClass,
}

impl SentimentScore {
    /// Build a score from a raw value, clamping to 100 and deriving the bucket.
    pub fn from_value(value: u8) -> Self {
        let value = value.min(100);
        Self {
            value,
            classification: SentimentClass::from_value(value),
        }
    }

    /// Fallback used whenever the sentiment lookup is unavailable.
    pub fn neutral() -> Self {
        Self {
            value: 50,
            classification: SentimentClass::Neutral,
        }
    }
}

impl Default for SentimentScore {
    fn default() -> Self {
        Self::neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_round_trip() {
        let frames = [
            ("15m", TimeFrame::Min15),
            ("1h", TimeFrame::Hour1),
            ("4h", TimeFrame::Hour4),
            ("1d", TimeFrame::Day1),
        ];
        for (s, tf) in frames {
            assert_eq!(TimeFrame::from_str(s), Some(tf));
            assert_eq!(tf.as_str(), s);
        }
    }

    #[test]
    fn timeframe_invalid_string_returns_none() {
        assert_eq!(TimeFrame::from_str("2m"), None);
        assert_eq!(TimeFrame::from_str(""), None);
    }

    #[test]
    fn timeframe_for_lookback_days() {
        assert_eq!(TimeFrame::for_lookback_days(1), TimeFrame::Min15);
        assert_eq!(TimeFrame::for_lookback_days(7), TimeFrame::Hour1);
        assert_eq!(TimeFrame::for_lookback_days(30), TimeFrame::Hour4);
        assert_eq!(TimeFrame::for_lookback_days(90), TimeFrame::Day1);
    }

    #[test]
    fn candle_deserializes_millisecond_time() {
        let json = r#"{"time":1704067200000,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":10.0}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.time.timestamp_millis(), 1704067200000);
        assert_eq!(candle.close, 1.5);
    }

    #[test]
    fn sentiment_class_buckets() {
        assert_eq!(SentimentClass::from_value(10), SentimentClass::ExtremeFear);
        assert_eq!(SentimentClass::from_value(30), SentimentClass::Fear);
        assert_eq!(SentimentClass::from_value(50), SentimentClass::Neutral);
        assert_eq!(SentimentClass::from_value(60), SentimentClass::Greed);
        assert_eq!(SentimentClass::from_value(90), SentimentClass::ExtremeGreed);
    }

    #[test]
    fn sentiment_class_serde_uses_index_labels() {
        let json = serde_json::to_string(&SentimentClass::ExtremeGreed).unwrap();
        assert_eq!(json, "\"Extreme Greed\"");
        assert_eq!(
            SentimentClass::from_label("Extreme Fear"),
            Some(SentimentClass::ExtremeFear)
        );
        assert_eq!(SentimentClass::from_label("Panic"), None);
    }

    #[test]
    fn sentiment_default_is_neutral_fifty() {
        let score = SentimentScore::default();
        assert_eq!(score.value, 50);
        assert_eq!(score.classification, SentimentClass::Neutral);
    }

    #[test]
    fn sentiment_from_value_clamps() {
        assert_eq!(SentimentScore::from_value(180).value, 100);
    }
}
