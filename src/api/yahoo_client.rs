use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ApiError, ApiRateLimiter, MarketDataProvider};
use crate::models::{
    CashFlowStatement, Config, PeriodValue, PriceHistory, CAPITAL_EXPENDITURE, OPERATING_CASH_FLOW,
};

/// Yahoo fundamentals series and the statement line item each one feeds
const CASH_FLOW_SERIES: [(&str, &str); 2] = [
    ("annualOperatingCashFlow", OPERATING_CASH_FLOW),
    ("annualCapitalExpenditure", CAPITAL_EXPENDITURE),
];

/// How far back the fundamentals query reaches
const FUNDAMENTALS_LOOKBACK_DAYS: i64 = 10 * 366;

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance client (chart + fundamentals timeseries endpoints)
pub struct YahooClient {
    client: Client,
    base_url: String,
    fundamentals_base_url: String,
    rate_limiter: ApiRateLimiter,
}

impl YahooClient {
    /// Create a new Yahoo client
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent("Mozilla/5.0 (compatible; dcf-valuator/1.0)")
            .build()?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
            fundamentals_base_url: config
                .yahoo_fundamentals_base_url
                .trim_end_matches('/')
                .to_string(),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    /// Make a throttled GET request and return the body text
    async fn make_request(&self, url: Url) -> Result<String, ApiError> {
        self.rate_limiter.wait().await;

        debug!("Making request to: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let body = response.text().await?;
        debug!("API response received: {} bytes", body.len());
        Ok(body)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooClient {
    async fn get_price_history(&self, symbol: &str) -> Result<PriceHistory, ApiError> {
        let mut url = Url::parse(&format!("{}/v8/finance/chart/{}", self.base_url, symbol))?;
        url.query_pairs_mut()
            .append_pair("range", "1y")
            .append_pair("interval", "1d");

        let body = self.make_request(url).await?;
        let history = parse_chart(symbol, &body)?;

        debug!("Retrieved {} closes for {}", history.closes.len(), symbol);
        Ok(history)
    }

    async fn get_cash_flow_statement(&self, symbol: &str) -> Result<CashFlowStatement, ApiError> {
        let now = Utc::now();
        let start = now - Duration::days(FUNDAMENTALS_LOOKBACK_DAYS);
        let types: Vec<&str> = CASH_FLOW_SERIES.iter().map(|(key, _)| *key).collect();

        let mut url = Url::parse(&format!(
            "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
            self.fundamentals_base_url, symbol
        ))?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("type", &types.join(","))
            .append_pair("period1", &start.timestamp().to_string())
            .append_pair("period2", &now.timestamp().to_string());

        let body = self.make_request(url).await?;
        let json: Value = serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let statement = parse_timeseries(symbol, &json)?;

        debug!(
            "Retrieved {} cash-flow line items for {}",
            statement.line_items.len(),
            symbol
        );
        Ok(statement)
    }
}

/// Parse a `/v8/finance/chart` payload
pub(crate) fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory, ApiError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;

    if let Some(error) = envelope.chart.error {
        return Err(ApiError::Decode(format!(
            "{}: {}",
            error.code.unwrap_or_default(),
            error.description.unwrap_or_default()
        )));
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ApiError::MissingData(symbol.to_string()))?;

    let closes = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .map(|quote| {
            quote
                .close
                .into_iter()
                .flatten()
                .filter(|close| close.is_finite())
                .collect()
        })
        .unwrap_or_default();

    Ok(PriceHistory {
        short_name: result.meta.short_name,
        closes,
        previous_close: result.meta.previous_close.or(result.meta.chart_previous_close),
    })
}

/// Parse a fundamentals-timeseries payload into statement line items
pub(crate) fn parse_timeseries(symbol: &str, body: &Value) -> Result<CashFlowStatement, ApiError> {
    let results = body
        .pointer("/timeseries/result")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::Decode(format!("missing timeseries result for {}", symbol)))?;

    let mut statement = CashFlowStatement::default();

    for result in results {
        let Some(series_type) = result.pointer("/meta/type/0").and_then(Value::as_str) else {
            continue;
        };
        let Some((_, line_item)) = CASH_FLOW_SERIES.iter().find(|(key, _)| *key == series_type)
        else {
            continue;
        };
        let Some(points) = result.get(series_type).and_then(Value::as_array) else {
            continue;
        };

        let periods: Vec<PeriodValue> = points
            .iter()
            .filter_map(|point| {
                let as_of = point.get("asOfDate")?.as_str()?;
                Some(PeriodValue {
                    as_of: NaiveDate::parse_from_str(as_of, "%Y-%m-%d").ok()?,
                    value: point.pointer("/reportedValue/raw").and_then(Value::as_f64),
                })
            })
            .collect();

        if !periods.is_empty() {
            statement.insert(line_item, periods);
        }
    }

    Ok(statement)
}
