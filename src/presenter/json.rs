use serde::Serialize;
use tracing::error;

use crate::orchestrator::Forecast;
use crate::presenter::Presenter;

#[derive(Serialize)]
struct Document<'a> {
    symbol: &'a str,
    #[serde(flatten)]
    forecast: &'a Forecast,
}

/// Prints the forecast as one pretty-printed JSON document on stdout.
pub struct JsonPresenter;

impl JsonPresenter {
    fn render(symbol: &str, forecast: &Forecast) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Document { symbol, forecast })
    }
}

impl Presenter for JsonPresenter {
    fn present(&self, symbol: &str, forecast: &Forecast) {
        match Self::render(symbol, forecast) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "failed to serialize forecast"),
        }
    }
}
