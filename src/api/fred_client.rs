use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ApiError, ApiRateLimiter, MacroDataProvider};
use crate::models::Config;

/// FRED marks unpublished observations with a single dot
const MISSING_VALUE: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// Federal Reserve Economic Data (FRED) client
pub struct FredClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    rate_limiter: ApiRateLimiter,
}

impl FredClient {
    /// Create a new FRED client
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent("dcf-valuator/1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: config.fred_api_key.clone(),
            base_url: config.fred_base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }
}

#[async_trait::async_trait]
impl MacroDataProvider for FredClient {
    async fn get_latest_observation(&self, series_id: &str) -> Result<f64, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingApiKey)?;

        let mut url = Url::parse(&format!("{}/fred/series/observations", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("series_id", series_id)
            .append_pair("api_key", api_key)
            .append_pair("file_type", "json")
            .append_pair("sort_order", "desc")
            .append_pair("limit", "10");

        self.rate_limiter.wait().await;
        debug!("Requesting latest {} observation", series_id);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: ObservationsResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;

        latest_value(series_id, &parsed.observations)
    }
}

/// First published value of a newest-first observation list
fn latest_value(series_id: &str, observations: &[Observation]) -> Result<f64, ApiError> {
    for observation in observations {
        if observation.value.trim() == MISSING_VALUE {
            continue;
        }
        let value: f64 = observation.value.trim().parse().map_err(|_| {
            ApiError::Decode(format!(
                "{} observation on {} is not numeric: {}",
                series_id, observation.date, observation.value
            ))
        })?;
        debug!("{} = {} as of {}", series_id, value, observation.date);
        return Ok(value);
    }

    Err(ApiError::MissingData(series_id.to_string()))
}
