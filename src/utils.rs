use chrono::Local;

use crate::models::Ticker;

/// Timestamp format written to the `Last Updated` field
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in `TIMESTAMP_FORMAT`
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Split raw input into normalized tickers. Each item may hold several
/// whitespace-separated symbols; duplicates are kept.
pub fn parse_tickers<I, S>(inputs: I) -> Vec<Ticker>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .flat_map(|input| {
            input
                .as_ref()
                .split_whitespace()
                .filter_map(Ticker::parse)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Worker pool size: one per task, capped by available cores and an optional limit
pub fn worker_count(task_count: usize, max_workers: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut workers = task_count.min(cores);
    if let Some(limit) = max_workers {
        workers = workers.min(limit);
    }
    workers.max(1)
}
