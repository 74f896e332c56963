use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::api::{ApiError, MarketDataProvider};
use crate::models::{
    CashFlowStatement, MetricsSnapshot, PriceHistory, Ticker, CAPITAL_EXPENDITURE,
    OPERATING_CASH_FLOW, UNKNOWN_COMPANY,
};
use crate::utils::timestamp_now;

/// Number of most recent reporting periods averaged for free cash flow
pub const FCF_PERIODS: usize = 5;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Pulls price and cash-flow data for one ticker and reduces it to a snapshot
#[derive(Clone)]
pub struct MetricsExtractor {
    provider: Arc<dyn MarketDataProvider>,
    timeout: Duration,
    retry_attempts: u32,
}

impl MetricsExtractor {
    pub fn new(provider: Arc<dyn MarketDataProvider>, timeout: Duration, retry_attempts: u32) -> Self {
        Self {
            provider,
            timeout,
            retry_attempts: retry_attempts.max(1),
        }
    }

    /// Snapshot for `ticker`, or `None` if anything went wrong fetching it
    pub async fn extract(&self, ticker: &Ticker) -> Option<MetricsSnapshot> {
        match tokio::time::timeout(self.timeout, self.fetch_with_retry(ticker)).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(e)) => {
                error!("Error retrieving data for {}: {}", ticker, e);
                None
            }
            Err(_) => {
                error!(
                    "Timed out retrieving data for {} after {}s",
                    ticker,
                    self.timeout.as_secs_f64()
                );
                None
            }
        }
    }

    async fn fetch_with_retry(&self, ticker: &Ticker) -> Result<MetricsSnapshot, ApiError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.fetch_snapshot(ticker).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_transient() && attempts < self.retry_attempts => {
                    warn!(
                        "Attempt {} failed for {}: {}. Retrying...",
                        attempts, ticker, e
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_snapshot(&self, ticker: &Ticker) -> Result<MetricsSnapshot, ApiError> {
        let history = self.provider.get_price_history(ticker.as_str()).await?;
        let statement = self.provider.get_cash_flow_statement(ticker.as_str()).await?;

        let snapshot = build_snapshot(ticker.clone(), &history, &statement);
        debug!("Extracted metrics for {}: {:?}", ticker, snapshot);
        Ok(snapshot)
    }
}

/// Assemble a snapshot from already-fetched provider data
pub fn build_snapshot(
    ticker: Ticker,
    history: &PriceHistory,
    statement: &CashFlowStatement,
) -> MetricsSnapshot {
    MetricsSnapshot {
        ticker,
        company_name: history
            .short_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_COMPANY)
            .to_string(),
        free_cash_flow: average_free_cash_flow(statement),
        current_price: current_price(history),
        last_updated: timestamp_now(),
    }
}

/// Last close of the window, else the provider's last-known close
pub fn current_price(history: &PriceHistory) -> Option<f64> {
    history.closes.last().copied().or(history.previous_close)
}

/// mean(operating cash flow) - mean(capital expenditure) over the same five most
/// recent reporting periods. `None` unless both line items have a value in that window.
pub fn average_free_cash_flow(statement: &CashFlowStatement) -> Option<f64> {
    let periods = statement.recent_periods(&[OPERATING_CASH_FLOW, CAPITAL_EXPENDITURE], FCF_PERIODS);
    let operating = statement.values_on(OPERATING_CASH_FLOW, &periods)?;
    let capex = statement.values_on(CAPITAL_EXPENDITURE, &periods)?;

    Some(mean(&operating) - mean(&capex))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
