use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::{ConfigError, IndicatorError};
use crate::indicator::bollinger::BollingerBands;
use crate::indicator::macd::Macd;
use crate::indicator::rsi::Rsi;
use crate::model::TimeFrame;
use crate::orchestrator::HorizonWindows;
use crate::prediction::PredictionEngine;
use crate::sentiment::FEAR_GREED_URL;
use crate::source::binance::BINANCE_BASE_URL;
use crate::source::coingecko::COINGECKO_BASE_URL;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_source() -> String {
    "binance".into()
}

fn default_symbol() -> String {
    "BTCUSDT".into()
}

fn default_lookback_days() -> u32 {
    7
}

fn default_binance_url() -> String {
    BINANCE_BASE_URL.into()
}

fn default_coingecko_url() -> String {
    COINGECKO_BASE_URL.into()
}

fn default_short_candles() -> usize {
    96
}

fn default_mid_candles() -> usize {
    240
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_std_dev() -> f64 {
    2.0
}

fn default_sentiment_url() -> String {
    FEAR_GREED_URL.into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub horizons: HorizonConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketConfig {
    /// Accepted values: `"binance"` | `"coingecko"` | `"file"`
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Kline interval override; derived from `lookback_days` when absent.
    pub interval: Option<String>,
    /// Required when `source = "file"`.
    pub candles_file: Option<String>,
    #[serde(default = "default_binance_url")]
    pub binance_url: String,
    /// Switch to CoinGecko when Binance fails or returns no candles.
    #[serde(default = "default_true")]
    pub coingecko_fallback: bool,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            symbol: default_symbol(),
            lookback_days: default_lookback_days(),
            interval: None,
            candles_file: None,
            binance_url: default_binance_url(),
            coingecko_fallback: true,
            coingecko_url: default_coingecko_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HorizonConfig {
    #[serde(default = "default_short_candles")]
    pub short_candles: usize,
    #[serde(default = "default_mid_candles")]
    pub mid_candles: usize,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            short_candles: default_short_candles(),
            mid_candles: default_mid_candles(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_std_dev")]
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_bollinger_period(),
            bollinger_std_dev: default_bollinger_std_dev(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sentiment_url")]
    pub url: String,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_sentiment_url(),
        }
    }
}

impl AppConfig {
    /// Sampling interval for the history request.
    pub fn timeframe(&self) -> TimeFrame {
        self.market
            .interval
            .as_deref()
            .and_then(TimeFrame::from_str)
            .unwrap_or_else(|| TimeFrame::for_lookback_days(self.market.lookback_days))
    }

    pub fn horizon_windows(&self) -> HorizonWindows {
        HorizonWindows {
            short: self.horizons.short_candles,
            mid: self.horizons.mid_candles,
        }
    }

    pub fn prediction_engine(&self) -> Result<PredictionEngine, Report<IndicatorError>> {
        let ind = &self.indicators;
        Ok(PredictionEngine::new(
            Rsi::new(ind.rsi_period)?,
            Macd::new(ind.macd_fast, ind.macd_slow, ind.macd_signal)?,
            BollingerBands::new(ind.bollinger_period, ind.bollinger_std_dev)?,
        ))
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_SOURCES: &[&str] = &["binance", "coingecko", "file"];
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_market(config)?;
    validate_horizons(config)?;
    validate_indicators(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    Ok(())
}

fn validate_market(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let market = &config.market;
    if !VALID_SOURCES.contains(&market.source.as_str()) {
        return Err(invalid(format!(
            "market.source \"{}\" is not valid",
            market.source
        )));
    }
    if market.source == "file" && market.candles_file.is_none() {
        return Err(invalid(
            "market.candles_file is required for source \"file\"".into(),
        ));
    }
    if market.lookback_days == 0 {
        return Err(invalid("market.lookback_days must be > 0".into()));
    }
    if let Some(interval) = &market.interval
        && TimeFrame::from_str(interval).is_none()
    {
        return Err(invalid(format!(
            "market.interval: unknown interval \"{interval}\""
        )));
    }
    Ok(())
}

fn validate_horizons(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let horizons = &config.horizons;
    if horizons.short_candles == 0 {
        return Err(invalid("horizons.short_candles must be > 0".into()));
    }
    if horizons.short_candles > horizons.mid_candles {
        return Err(invalid(format!(
            "horizons.short_candles ({}) must not exceed mid_candles ({})",
            horizons.short_candles, horizons.mid_candles
        )));
    }
    Ok(())
}

fn validate_indicators(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    config
        .prediction_engine()
        .map(|_| ())
        .change_context(ConfigError::Validation {
            field: "indicators".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[market]
source = "file"
symbol = "BTCEUR"
lookback_days = 30
interval = "1h"
candles_file = "candles.json"

[horizons]
short_candles = 48
mid_candles = 120

[indicators]
rsi_period = 10
macd_fast = 8
macd_slow = 21
macd_signal = 5
bollinger_period = 14
bollinger_std_dev = 2.5

[sentiment]
enabled = false
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.market.symbol, "BTCEUR");
        assert_eq!(config.timeframe(), TimeFrame::Hour1);
        assert_eq!(config.horizon_windows(), HorizonWindows { short: 48, mid: 120 });
        assert!(!config.sentiment.enabled);
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let toml = r#"
[general]
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.market.source, "binance");
        assert_eq!(config.market.symbol, "BTCUSDT");
        assert_eq!(config.market.lookback_days, 7);
        assert!(config.market.coingecko_fallback);
        assert_eq!(config.market.coingecko_url, COINGECKO_BASE_URL);
        assert_eq!(config.horizons.short_candles, 96);
        assert_eq!(config.horizons.mid_candles, 240);
        assert_eq!(config.indicators.rsi_period, 14);
        assert_eq!(config.indicators.bollinger_std_dev, 2.0);
        assert!(config.sentiment.enabled);
        assert_eq!(config.sentiment.url, FEAR_GREED_URL);
        assert_eq!(config.timeframe(), TimeFrame::Hour1);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn unknown_source_rejected() {
        let config = parse(
            r#"
[general]
[market]
source = "kraken"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn file_source_requires_path() {
        let config = parse(
            r#"
[general]
[market]
source = "file"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn invalid_interval_rejected() {
        let config = parse(
            r#"
[general]
[market]
interval = "2m"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn short_window_larger_than_mid_rejected() {
        let config = parse(
            r#"
[general]
[horizons]
short_candles = 300
mid_candles = 240
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn macd_fast_not_below_slow_rejected() {
        let config = parse(
            r#"
[general]
[indicators]
macd_fast = 26
macd_slow = 12
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn non_finite_std_dev_rejected() {
        let config = parse(
            r#"
[general]
[indicators]
bollinger_std_dev = nan
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_period_rejected() {
        let config = parse(
            r#"
[general]
[indicators]
rsi_period = 0
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = parse(
            r#"
[general]
log_format = "xml"
"#,
        );
        assert!(validate(&config).is_err());
    }
}
