use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dcf_valuator::api::{FredClient, YahooClient};
use dcf_valuator::concurrent_fetcher::{BatchConfig, BatchError, BatchOrchestrator};
use dcf_valuator::extractors::MetricsExtractor;
use dcf_valuator::models::{Config, ConfigOverrides, WritePolicy};

/// Simplified DCF valuation for a list of stock tickers
#[derive(Parser)]
#[command(name = "dcf-valuator")]
#[command(version = "0.1.0")]
#[command(about = "Fetch cash-flow metrics, estimate a simplified DCF value and save it to CSV and JSON")]
#[command(long_about = "
Fetches one year of prices and the annual cash-flow statement for each ticker from Yahoo
Finance, averages free cash flow over the five most recent periods, and records a placeholder
intrinsic value of ten times that figure. Results are written to a CSV file and a JSON file.

The FRED_API_KEY environment variable (or a .env file) enables the risk-free rate lookup.

Examples:
  dcf-valuator AAPL MSFT GOOG
  dcf-valuator --policy append --no-status AAPL
  dcf-valuator                      # prompts for tickers
")]
struct Args {
    /// Ticker symbols; prompts on stdin when omitted
    tickers: Vec<String>,

    /// CSV output path (overrides VALUATIONS_CSV_PATH)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// JSON output path (overrides VALUATIONS_JSON_PATH)
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write policy for both stores (overrides WRITE_POLICY)
    #[arg(long, value_enum)]
    policy: Option<WritePolicy>,

    /// Leave out the Valuation Status label
    #[arg(long)]
    no_status: bool,

    /// Upper bound on concurrent workers
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Per-ticker fetch timeout in seconds (overrides FETCH_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dcf_valuator=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(Args::parse()).await {
        match e.downcast_ref::<BatchError>() {
            Some(BatchError::EmptyInput) => error!("No stock tickers provided. Exiting."),
            _ => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()
        .context("Failed to load configuration")?
        .apply_overrides(ConfigOverrides {
            csv_path: args.csv,
            json_path: args.json,
            write_policy: args.policy,
            no_status: args.no_status,
            max_workers: args.workers,
            fetch_timeout_secs: args.timeout_secs,
        });

    let inputs = if args.tickers.is_empty() {
        vec![prompt_for_tickers()?]
    } else {
        args.tickers
    };

    let yahoo = YahooClient::new(&config).context("Failed to build Yahoo Finance client")?;
    let fred = FredClient::new(&config).context("Failed to build FRED client")?;

    let extractor = MetricsExtractor::new(Arc::new(yahoo), config.fetch_timeout, config.retry_attempts);
    let orchestrator = BatchOrchestrator::new(extractor, Arc::new(fred), BatchConfig::from(&config));

    let summary = orchestrator.run(inputs).await?;
    info!(
        "Saved {} of {} ticker(s) to {} and {}",
        summary.writes.written,
        summary.total_tickers,
        config.csv_path.display(),
        config.json_path.display()
    );

    Ok(())
}

/// Read one line of space-separated tickers from stdin
fn prompt_for_tickers() -> Result<String> {
    use std::io::{self, Write};

    print!("Enter stock ticker(s) separated by spaces: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input)
}
