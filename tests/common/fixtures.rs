//! In-memory providers standing in for Yahoo Finance and FRED

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dcf_valuator::api::{ApiError, MacroDataProvider, MarketDataProvider};
use dcf_valuator::concurrent_fetcher::{BatchConfig, BatchOrchestrator};
use dcf_valuator::extractors::MetricsExtractor;
use dcf_valuator::models::{
    CashFlowStatement, PeriodValue, PriceHistory, WritePolicy, CAPITAL_EXPENDITURE,
    OPERATING_CASH_FLOW,
};

/// Annual periods, newest first, ending with fiscal 2024
pub fn annual_periods(values: &[f64]) -> Vec<PeriodValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| PeriodValue {
            as_of: NaiveDate::from_ymd_opt(2024 - i as i32, 12, 31).unwrap(),
            value: Some(*value),
        })
        .collect()
}

pub fn cash_flow_statement(operating: &[f64], capex: &[f64]) -> CashFlowStatement {
    let mut statement = CashFlowStatement::default();
    if !operating.is_empty() {
        statement.insert(OPERATING_CASH_FLOW, annual_periods(operating));
    }
    if !capex.is_empty() {
        statement.insert(CAPITAL_EXPENDITURE, annual_periods(capex));
    }
    statement
}

pub fn price_history(name: &str, closes: &[f64]) -> PriceHistory {
    PriceHistory {
        short_name: Some(name.to_string()),
        closes: closes.to_vec(),
        previous_close: None,
    }
}

/// Market data keyed by symbol; unknown symbols fail like a delisted ticker
#[derive(Default)]
pub struct FakeMarketData {
    companies: HashMap<String, (PriceHistory, CashFlowStatement)>,
    calls: AtomicUsize,
}

impl FakeMarketData {
    pub fn with_company(mut self, symbol: &str, history: PriceHistory, statement: CashFlowStatement) -> Self {
        self.companies.insert(symbol.to_string(), (history, statement));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FakeMarketData {
    async fn get_price_history(&self, symbol: &str) -> Result<PriceHistory, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.companies
            .get(symbol)
            .map(|(history, _)| history.clone())
            .ok_or_else(|| ApiError::MissingData(symbol.to_string()))
    }

    async fn get_cash_flow_statement(&self, symbol: &str) -> Result<CashFlowStatement, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.companies
            .get(symbol)
            .map(|(_, statement)| statement.clone())
            .ok_or_else(|| ApiError::MissingData(symbol.to_string()))
    }
}

/// Fixed risk-free observation, or an outage when `None`
pub struct FakeMacroData {
    percent: Option<f64>,
    calls: AtomicUsize,
}

impl FakeMacroData {
    pub fn new(percent: Option<f64>) -> Self {
        Self {
            percent,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MacroDataProvider for FakeMacroData {
    async fn get_latest_observation(&self, series_id: &str) -> Result<f64, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.percent
            .ok_or_else(|| ApiError::MissingData(series_id.to_string()))
    }
}

/// Two healthy companies: AAPL (undervalued) and MSFT (overvalued)
pub fn sample_market() -> FakeMarketData {
    FakeMarketData::default()
        .with_company(
            "AAPL",
            price_history("Apple Inc.", &[180.0, 185.0, 190.0]),
            cash_flow_statement(&[110.0, 120.0, 100.0], &[-10.0, -10.0, -10.0]),
        )
        .with_company(
            "MSFT",
            price_history("Microsoft Corporation", &[410.0, 420.0]),
            cash_flow_statement(&[30.0, 30.0], &[-5.0, -5.0]),
        )
}

/// Orchestrator writing to the given paths
pub fn orchestrator(
    market: Arc<FakeMarketData>,
    macro_data: Arc<FakeMacroData>,
    csv_path: std::path::PathBuf,
    json_path: std::path::PathBuf,
    write_policy: WritePolicy,
) -> BatchOrchestrator {
    let extractor = MetricsExtractor::new(market, Duration::from_secs(5), 1);
    BatchOrchestrator::new(
        extractor,
        macro_data,
        BatchConfig {
            csv_path,
            json_path,
            write_policy,
            include_status: true,
            max_workers: None,
        },
    )
}
