use std::path::PathBuf;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::SourceError;
use crate::model::{Candle, TimeFrame};
use crate::source::MarketSource;

/// Candle history stored as a JSON array of
/// `{ "time": <ms>, "open", "high", "low", "close", "volume" }` objects.
///
/// The live price is the close of the newest candle. The file is read once
/// and shared by every later call.
pub struct FileSource {
    path: PathBuf,
    candles: OnceCell<Vec<Candle>>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            candles: OnceCell::new(),
        }
    }

    async fn candles(&self) -> Result<&[Candle], Report<SourceError>> {
        self.candles
            .get_or_try_init(|| self.load())
            .await
            .map(Vec::as_slice)
    }

    async fn load(&self) -> Result<Vec<Candle>, Report<SourceError>> {
        let path = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .change_context(SourceError::ReadFile { path: path.clone() })?;

        let mut candles: Vec<Candle> = serde_json::from_str(&content)
            .change_context(SourceError::ResponseParse {
                service: "file".into(),
            })
            .attach_with(|| format!("path: {path}"))?;

        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }
}

impl MarketSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    /// The file is treated as already sampled, so `timeframe` is not applied.
    /// The requested span is anchored at the newest candle in the file rather
    /// than at `end`, so recorded history stays usable.
    fn fetch_candles(
        &self,
        _symbol: &str,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        Box::pin(async move {
            let all = self.candles().await?;
            let candles: Vec<Candle> = match all.last() {
                Some(newest) => {
                    let from = newest.time - (end - start);
                    all.iter().filter(|c| c.time >= from).cloned().collect()
                }
                None => Vec::new(),
            };

            info!(
                path = %self.path.display(),
                timeframe = %timeframe,
                loaded = candles.len(),
                "file candle load complete"
            );

            Ok(candles)
        })
    }

    fn fetch_price(&self, _symbol: &str) -> BoxFuture<'_, Result<f64, Report<SourceError>>> {
        Box::pin(async move {
            let candles = self.candles().await?;
            candles.last().map(|c| c.close).ok_or_else(|| {
                Report::new(SourceError::ResponseParse {
                    service: "file".into(),
                })
                .attach("candle file is empty")
            })
        })
    }
}
