use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use thiserror::Error;

use crate::models::{CashFlowStatement, PriceHistory};

pub mod fred_client;
pub mod yahoo_client;
pub use fred_client::FredClient;
pub use yahoo_client::YahooClient;

/// Errors raised by the provider clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("No data returned for {0}")]
    MissingData(String),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API key not configured")]
    MissingApiKey,
}

impl ApiError {
    /// Network failures, throttling and server-side errors are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Request throttle shared by every call a client makes
pub struct ApiRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Source of per-company price history and financial statements
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// One year of daily closes and chart metadata
    async fn get_price_history(&self, symbol: &str) -> Result<PriceHistory, ApiError>;

    /// Annual cash-flow statement line items
    async fn get_cash_flow_statement(&self, symbol: &str) -> Result<CashFlowStatement, ApiError>;
}

/// Source of macroeconomic time series
#[async_trait::async_trait]
pub trait MacroDataProvider: Send + Sync {
    /// Most recent published value of `series_id`, in the series' own units
    async fn get_latest_observation(&self, series_id: &str) -> Result<f64, ApiError>;
}
