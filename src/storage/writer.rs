//! Single-writer task
//!
//! Owns both stores for the lifetime of a batch. Workers hand records over a
//! bounded channel; the task applies them one at a time on a blocking thread,
//! so no two read-filter-write cycles on the same file ever overlap.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use super::{CsvStore, JsonStore, ValuationStore};
use crate::models::{ValuationRecord, WritePolicy};

const CHANNEL_CAPACITY: usize = 64;

/// Outcome counts for one writer task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub received: usize,
    /// Records that reached both stores
    pub written: usize,
    pub csv_failures: usize,
    pub json_failures: usize,
}

/// Handle to the running writer task
pub struct StoreWriterHandle {
    sender: mpsc::Sender<ValuationRecord>,
    task: JoinHandle<WriteReport>,
}

impl StoreWriterHandle {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(csv: CsvStore, json: JsonStore, policy: WritePolicy) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ValuationRecord>(CHANNEL_CAPACITY);

        let task = tokio::task::spawn_blocking(move || {
            let mut report = WriteReport::default();

            while let Some(record) = receiver.blocking_recv() {
                report.received += 1;
                // One store failing must not stop the other
                let csv_ok = apply(&csv, &record, policy);
                let json_ok = apply(&json, &record, policy);

                if !csv_ok {
                    report.csv_failures += 1;
                }
                if !json_ok {
                    report.json_failures += 1;
                }
                if csv_ok && json_ok {
                    report.written += 1;
                }
            }

            report
        });

        Self { sender, task }
    }

    /// A sender workers can clone and move into their tasks
    pub fn sender(&self) -> mpsc::Sender<ValuationRecord> {
        self.sender.clone()
    }

    /// Close the channel, drain queued records and return the final counts.
    /// Waits for every outstanding `sender()` clone to be dropped.
    pub async fn shutdown(self) -> Result<WriteReport, JoinError> {
        drop(self.sender);
        self.task.await
    }
}

fn apply(store: &dyn ValuationStore, record: &ValuationRecord, policy: WritePolicy) -> bool {
    match store.write(record, policy) {
        Ok(()) => {
            info!(
                "Data updated in {} ({} {})",
                store.path().display(),
                record.ticker(),
                policy
            );
            true
        }
        Err(e) => {
            error!(
                "Error saving {} to {} store: {}",
                record.ticker(),
                store.kind(),
                e
            );
            false
        }
    }
}
