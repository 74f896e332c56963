//! Concurrent valuation batch
//!
//! Drives every ticker through extract -> valuate -> persist on its own task.
//! At most `min(tickers, cores)` tasks run at once, and all file writes go
//! through one `StoreWriterHandle`. A ticker that fails to extract is logged
//! and skipped; it never stops the rest of the batch.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::{
    analysis::{current_risk_free_rate, valuate},
    api::MacroDataProvider,
    extractors::MetricsExtractor,
    models::{Config, Ticker, ValuationRecord, WritePolicy},
    storage::{CsvStore, JsonStore, StoreWriterHandle, WriteReport},
    utils::{parse_tickers, worker_count},
};

/// Configuration for one batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub write_policy: WritePolicy,
    pub include_status: bool,
    pub max_workers: Option<usize>,
}

impl From<&Config> for BatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            csv_path: config.csv_path.clone(),
            json_path: config.json_path.clone(),
            write_policy: config.write_policy,
            include_status: config.include_status,
            max_workers: config.max_workers,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No stock tickers provided")]
    EmptyInput,

    #[error("Store writer task failed: {0}")]
    Writer(#[from] JoinError),
}

/// Result of a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total_tickers: usize,
    /// Tickers whose record reached the writer
    pub processed: usize,
    /// Tickers dropped for missing data, timeouts or worker failure
    pub skipped: usize,
    pub writes: WriteReport,
    /// Fetched once per batch; not used by the placeholder multiplier
    pub risk_free_rate: f64,
}

/// Status of one ticker's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerOutcome {
    Submitted,
    Skipped,
}

/// Fans a ticker list out over a bounded pool of tasks
pub struct BatchOrchestrator {
    extractor: MetricsExtractor,
    macro_provider: Arc<dyn MacroDataProvider>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(
        extractor: MetricsExtractor,
        macro_provider: Arc<dyn MacroDataProvider>,
        config: BatchConfig,
    ) -> Self {
        Self {
            extractor,
            macro_provider,
            config,
        }
    }

    /// Run the whole batch. Fails before touching any provider or file when
    /// the input holds no tickers.
    pub async fn run<I, S>(&self, inputs: I) -> Result<BatchSummary, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tickers = parse_tickers(inputs);
        if tickers.is_empty() {
            return Err(BatchError::EmptyInput);
        }

        let total_tickers = tickers.len();
        let workers = worker_count(total_tickers, self.config.max_workers);
        info!(
            "🚀 Starting valuation batch: {} ticker(s), {} worker(s), {} policy",
            total_tickers, workers, self.config.write_policy
        );

        let risk_free_rate = current_risk_free_rate(self.macro_provider.as_ref()).await;

        let writer = StoreWriterHandle::spawn(
            CsvStore::new(&self.config.csv_path, self.config.include_status),
            JsonStore::new(&self.config.json_path),
            self.config.write_policy,
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut names = Vec::with_capacity(total_tickers);
        let mut handles = Vec::with_capacity(total_tickers);

        for ticker in tickers {
            let semaphore = Arc::clone(&semaphore);
            let extractor = self.extractor.clone();
            let sender = writer.sender();
            let include_status = self.config.include_status;
            let task_ticker = ticker.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TickerOutcome::Skipped,
                };
                process_ticker(&extractor, task_ticker, include_status, risk_free_rate, &sender).await
            });

            names.push(ticker);
            handles.push(handle);
        }

        let mut processed = 0;
        let mut skipped = 0;
        for (ticker, outcome) in names.iter().zip(join_all(handles).await) {
            match outcome {
                Ok(TickerOutcome::Submitted) => processed += 1,
                Ok(TickerOutcome::Skipped) => skipped += 1,
                Err(e) => {
                    error!("❌ Worker for {} failed: {}", ticker, e);
                    skipped += 1;
                }
            }
        }

        let writes = writer.shutdown().await?;

        info!("✅ Batch processing complete. Data updated in CSV and JSON.");
        info!(
            "📊 Results: {} processed, {} skipped, {} CSV failures, {} JSON failures",
            processed, skipped, writes.csv_failures, writes.json_failures
        );

        Ok(BatchSummary {
            total_tickers,
            processed,
            skipped,
            writes,
            risk_free_rate,
        })
    }
}

/// Extract, value and hand off one ticker
async fn process_ticker(
    extractor: &MetricsExtractor,
    ticker: Ticker,
    include_status: bool,
    risk_free_rate: f64,
    sender: &mpsc::Sender<ValuationRecord>,
) -> TickerOutcome {
    info!("Analyzing {}...", ticker);

    let Some(snapshot) = extractor.extract(&ticker).await else {
        warn!("Skipping {} due to missing data.", ticker);
        return TickerOutcome::Skipped;
    };

    debug!(
        "Valuing {} with risk-free rate {:.4} available",
        ticker, risk_free_rate
    );
    let record = valuate(snapshot, include_status);

    if sender.send(record).await.is_err() {
        error!("Store writer closed before {} could be saved", ticker);
        return TickerOutcome::Skipped;
    }

    TickerOutcome::Submitted
}
