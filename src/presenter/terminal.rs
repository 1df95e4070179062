use tracing::info;

use crate::orchestrator::{Forecast, Horizon};
use crate::presenter::Presenter;

/// Writes the forecast as structured log lines.
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn present(&self, symbol: &str, forecast: &Forecast) {
        let summary = &forecast.summary;
        info!(
            symbol,
            price = summary.current_price,
            change_pct = ?summary.price_change_pct,
            volume = summary.total_volume,
            candles = summary.candle_count,
            "market summary"
        );

        for entry in Horizon::ALL.iter().filter_map(|&h| forecast.get(h)) {
            let prediction = &entry.prediction;
            info!(
                symbol,
                horizon = %entry.horizon,
                window = entry.window_len,
                predicted_price = %format!("{:.2}", prediction.predicted_price),
                confidence = %format!("{:.0}%", prediction.confidence),
                trend = %prediction.trend,
                "prediction"
            );
        }

        let panel = &forecast.panel;
        info!(
            symbol,
            rsi = ?panel.rsi,
            macd = ?panel.macd.map(|m| m.line),
            sma7 = ?panel.sma7,
            sma30 = ?panel.sma30,
            sentiment = forecast.sentiment.value,
            sentiment_class = %forecast.sentiment.classification,
            "indicators"
        );
    }
}
