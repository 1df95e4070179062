use error_stack::{Report, ResultExt};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::model::{SentimentClass, SentimentScore};

pub const FEAR_GREED_URL: &str = "https://api.alternative.me/fng/?limit=1";

/// Client for the alternative.me Fear & Greed index.
pub struct FearGreedClient {
    client: reqwest::Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_owned(),
        }
    }

    pub async fn fetch(&self) -> Result<SentimentScore, Report<SourceError>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .change_context(SourceError::Request {
                service: "fear-greed".into(),
            })?;

        if !response.status().is_success() {
            return Err(Report::new(SourceError::Request {
                service: "fear-greed".into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        let body: FearGreedResponse =
            response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    service: "fear-greed".into(),
                })?;

        let score = body.into_score()?;
        info!(
            value = score.value,
            classification = %score.classification,
            "fear & greed index fetched"
        );
        Ok(score)
    }

    /// Fetch the index, falling back to a neutral 50 on any failure.
    pub async fn fetch_or_neutral(&self) -> SentimentScore {
        match self.fetch().await {
            Ok(score) => score,
            Err(e) => {
                warn!(error = ?e, "fear & greed lookup failed, using neutral sentiment");
                SentimentScore::neutral()
            }
        }
    }
}

impl Default for FearGreedClient {
    fn default() -> Self {
        Self::new(FEAR_GREED_URL)
    }
}

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    data: Vec<FearGreedEntry>,
}

/// The API encodes every field as a string.
#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
    value_classification: String,
}

impl FearGreedResponse {
    fn into_score(self) -> Result<SentimentScore, Report<SourceError>> {
        let parse_error = || SourceError::ResponseParse {
            service: "fear-greed".into(),
        };

        let entry = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Report::new(parse_error()).attach("empty data array"))?;

        let value: u8 = entry
            .value
            .trim()
            .parse()
            .change_context_lazy(parse_error)
            .attach_with(|| format!("value: {:?}", entry.value))?;
        if value > 100 {
            return Err(Report::new(parse_error()).attach(format!("value out of range: {value}")));
        }

        let mut score = SentimentScore::from_value(value);
        if let Some(classification) = SentimentClass::from_label(&entry.value_classification) {
            score.classification = classification;
        }
        Ok(score)
    }
}
