use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Multiplier applied to average free cash flow to get the placeholder intrinsic value
pub const DCF_MULTIPLIER: f64 = 10.0;

/// Company name used when the provider has none
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Cash-flow statement line items used for free cash flow
pub const OPERATING_CASH_FLOW: &str = "Operating Cash Flow";
pub const CAPITAL_EXPENDITURE: &str = "Capital Expenditure";

/// Uppercase, whitespace-free ticker symbol. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalize a raw symbol (trim + uppercase). Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            None
        } else {
            Some(Ticker(symbol))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value).ok_or_else(|| format!("invalid ticker symbol: {:?}", value))
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// Qualitative label comparing intrinsic value to market price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuationStatus {
    Undervalued,
    Overvalued,
    Unknown,
}

impl ValuationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationStatus::Undervalued => "Undervalued",
            ValuationStatus::Overvalued => "Overvalued",
            ValuationStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ValuationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValuationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Undervalued" => Ok(ValuationStatus::Undervalued),
            "Overvalued" => Ok(ValuationStatus::Overvalued),
            "Unknown" => Ok(ValuationStatus::Unknown),
            other => Err(format!("unknown valuation status: {}", other)),
        }
    }
}

/// How a store treats an existing entry with the same ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WritePolicy {
    /// Always add a new entry; duplicates accumulate over time
    Append,
    /// Replace any entry sharing the ticker, keeping at most one per ticker
    #[default]
    Upsert,
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::Append => f.write_str("append"),
            WritePolicy::Upsert => f.write_str("upsert"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(WritePolicy::Append),
            "upsert" => Ok(WritePolicy::Upsert),
            other => Err(format!("unknown write policy '{}' (expected append or upsert)", other)),
        }
    }
}

/// Per-ticker metrics pulled from the market-data provider
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub ticker: Ticker,
    pub company_name: String,
    pub free_cash_flow: Option<f64>,
    pub current_price: Option<f64>,
    pub last_updated: String,
}

/// One persisted valuation. `dcf_intrinsic_value` is always derived from
/// `free_cash_flow`, so records are only built by `analysis::valuation::valuate`
/// or loaded back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    #[serde(rename = "Ticker")]
    pub(crate) ticker: Ticker,
    #[serde(rename = "Company Name")]
    pub(crate) company_name: String,
    #[serde(rename = "Free Cash Flow")]
    pub(crate) free_cash_flow: Option<f64>,
    #[serde(rename = "Current Price")]
    pub(crate) current_price: Option<f64>,
    #[serde(rename = "DCF Intrinsic Value")]
    pub(crate) dcf_intrinsic_value: Option<f64>,
    #[serde(
        rename = "Valuation Status",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) valuation_status: Option<ValuationStatus>,
    #[serde(rename = "Last Updated")]
    pub(crate) last_updated: String,
}

impl ValuationRecord {
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn free_cash_flow(&self) -> Option<f64> {
        self.free_cash_flow
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    pub fn dcf_intrinsic_value(&self) -> Option<f64> {
        self.dcf_intrinsic_value
    }

    pub fn valuation_status(&self) -> Option<ValuationStatus> {
        self.valuation_status
    }

    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }
}

/// One year of daily closes plus chart metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub short_name: Option<String>,
    /// Oldest first; days without a close are already dropped
    pub closes: Vec<f64>,
    pub previous_close: Option<f64>,
}

/// Value of one line item for one reporting period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodValue {
    pub as_of: NaiveDate,
    pub value: Option<f64>,
}

/// Cash-flow statement keyed by line item name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashFlowStatement {
    pub line_items: HashMap<String, Vec<PeriodValue>>,
}

impl CashFlowStatement {
    pub fn insert(&mut self, name: &str, periods: Vec<PeriodValue>) {
        self.line_items.insert(name.to_string(), periods);
    }

    /// The `periods` most recent reporting dates reported by any of `names`, newest first
    pub fn recent_periods(&self, names: &[&str], periods: usize) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = names
            .iter()
            .filter_map(|name| self.line_items.get(*name))
            .flatten()
            .map(|p| p.as_of)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates.truncate(periods);
        dates
    }

    /// Non-null values of `name` reported on one of `dates`.
    /// `None` when the line item is absent or has no values on those dates.
    pub fn values_on(&self, name: &str, dates: &[NaiveDate]) -> Option<Vec<f64>> {
        let values: Vec<f64> = self
            .line_items
            .get(name)?
            .iter()
            .filter(|p| dates.contains(&p.as_of))
            .filter_map(|p| p.value)
            .filter(|v| v.is_finite())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub fred_api_key: Option<String>,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub write_policy: WritePolicy,
    pub include_status: bool,
    pub fetch_timeout: Duration,
    pub retry_attempts: u32,
    pub rate_limit_per_minute: u32,
    pub max_workers: Option<usize>,
    pub yahoo_base_url: String,
    pub yahoo_fundamentals_base_url: String,
    pub fred_base_url: String,
}

/// Command-line values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub write_policy: Option<WritePolicy>,
    pub no_status: bool,
    pub max_workers: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let write_policy = match lookup("WRITE_POLICY") {
            Some(raw) => raw.parse::<WritePolicy>().map_err(|e| anyhow::anyhow!(e))?,
            None => WritePolicy::default(),
        };

        let include_status = match lookup("VALUATION_STATUS") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| anyhow::anyhow!("VALUATION_STATUS must be true or false, got '{}'", raw))?,
            None => true,
        };

        Ok(Config {
            fred_api_key: lookup("FRED_API_KEY").filter(|key| !key.trim().is_empty()),
            csv_path: lookup("VALUATIONS_CSV_PATH")
                .unwrap_or_else(|| "valuations.csv".to_string())
                .into(),
            json_path: lookup("VALUATIONS_JSON_PATH")
                .unwrap_or_else(|| "valuations.json".to_string())
                .into(),
            write_policy,
            include_status,
            fetch_timeout: Duration::from_secs(
                lookup("FETCH_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            retry_attempts: lookup("RETRY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|attempts| *attempts > 0)
                .unwrap_or(2),
            rate_limit_per_minute: lookup("RATE_LIMIT_PER_MINUTE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            max_workers: None,
            yahoo_base_url: lookup("YAHOO_BASE_URL")
                .unwrap_or_else(|| "https://query1.finance.yahoo.com".to_string()),
            yahoo_fundamentals_base_url: lookup("YAHOO_FUNDAMENTALS_BASE_URL")
                .unwrap_or_else(|| "https://query2.finance.yahoo.com".to_string()),
            fred_base_url: lookup("FRED_BASE_URL")
                .unwrap_or_else(|| "https://api.stlouisfed.org".to_string()),
        })
    }

    /// Overlay command-line flags on top of the loaded configuration
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(path) = overrides.csv_path {
            self.csv_path = path;
        }
        if let Some(path) = overrides.json_path {
            self.json_path = path;
        }
        if let Some(policy) = overrides.write_policy {
            self.write_policy = policy;
        }
        if overrides.no_status {
            self.include_status = false;
        }
        if let Some(workers) = overrides.max_workers.filter(|w| *w > 0) {
            self.max_workers = Some(workers);
        }
        if let Some(secs) = overrides.fetch_timeout_secs {
            self.fetch_timeout = Duration::from_secs(secs);
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
