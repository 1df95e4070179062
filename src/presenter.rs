pub mod json;
pub mod terminal;

use crate::orchestrator::Forecast;

/// Sink for finished forecasts.
pub trait Presenter: Send + Sync {
    fn present(&self, symbol: &str, forecast: &Forecast);
}
