mod config;
mod error;
mod indicator;
mod model;
mod orchestrator;
mod prediction;
mod presenter;
mod sentiment;
mod source;

use std::path::Path;

use chrono::{Duration, Utc};
use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use model::SentimentScore;
use orchestrator::Orchestrator;
use presenter::Presenter;
use presenter::json::JsonPresenter;
use presenter::terminal::TerminalPresenter;
use sentiment::FearGreedClient;
use source::MarketSource;
use source::binance::BinanceSource;
use source::coingecko::CoinGeckoSource;
use source::fallback::FallbackSource;
use source::file::FileSource;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data error")]
    Source,
}

#[derive(Parser)]
#[command(
    name = "price-forecast",
    about = "Short, mid and long horizon price forecasts from technical indicators"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Print the forecast as JSON instead of log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let engine = config
        .prediction_engine()
        .change_context(AppError::Config)?;
    let orchestrator = Orchestrator::new(engine, config.horizon_windows());

    let source = build_source(&config)?;
    let sentiment_client = FearGreedClient::new(&config.sentiment.url);

    // ── Market data ───────────────────────────────────────────────────────────
    let symbol = config.market.symbol.as_str();
    let timeframe = config.timeframe();
    let end = Utc::now();
    let start = end - Duration::days(i64::from(config.market.lookback_days));

    info!(
        source = source.name(),
        symbol,
        timeframe = %timeframe,
        lookback_days = config.market.lookback_days,
        "fetching market data"
    );

    let (candles, price, sentiment) = tokio::join!(
        source.fetch_candles(symbol, timeframe, start, end),
        source.fetch_price(symbol),
        async {
            if config.sentiment.enabled {
                sentiment_client.fetch_or_neutral().await
            } else {
                SentimentScore::neutral()
            }
        },
    );

    let candles = candles.unwrap_or_else(|e| {
        warn!(error = ?e, "candle history unavailable, indicators will be skipped");
        Vec::new()
    });

    let current_price = match (price, candles.last()) {
        (Ok(price), _) => price,
        (Err(e), Some(last)) => {
            warn!(error = ?e, fallback = last.close, "live price unavailable, using last close");
            last.close
        }
        (Err(e), None) => {
            return Err(e
                .change_context(AppError::Source)
                .attach("no candles available to derive a price"));
        }
    };

    // ── Forecast ──────────────────────────────────────────────────────────────
    let forecast = orchestrator.forecast(&candles, current_price, &sentiment);

    let presenter: Box<dyn Presenter> = if cli.json {
        Box::new(JsonPresenter)
    } else {
        Box::new(TerminalPresenter)
    };
    presenter.present(symbol, &forecast);

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_source(config: &AppConfig) -> Result<Box<dyn MarketSource>, Report<AppError>> {
    let market = &config.market;
    match market.source.as_str() {
        "binance" => {
            let binance = Box::new(BinanceSource::with_base_url(&market.binance_url));
            if market.coingecko_fallback {
                let coingecko = Box::new(CoinGeckoSource::with_base_url(&market.coingecko_url));
                Ok(Box::new(FallbackSource::new(binance, coingecko)))
            } else {
                Ok(binance)
            }
        }
        "coingecko" => Ok(Box::new(CoinGeckoSource::with_base_url(
            &market.coingecko_url,
        ))),
        "file" => {
            let path = market.candles_file.as_deref().ok_or_else(|| {
                Report::new(AppError::Config).attach("market.candles_file is not set")
            })?;
            Ok(Box::new(FileSource::new(path)))
        }
        other => Err(Report::new(AppError::Config).attach(format!("unknown source: {other}"))),
    }
}
