use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{write_atomically, StoreError, ValuationStore};
use crate::models::{Ticker, ValuationRecord, WritePolicy};

const TICKER_KEY: &str = "Ticker";

/// JSON array of valuation objects, pretty-printed with four-space indentation
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current array contents. Missing, empty or malformed files read as `[]`.
    fn read_entries(&self) -> Result<Vec<Value>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Ignoring unreadable contents of {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn save_entries(&self, entries: &[Value]) -> Result<(), StoreError> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
        entries
            .serialize(&mut serializer)
            .map_err(|e| self.json_error(e))?;

        write_atomically(&self.path, &buffer)
    }

    fn json_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Json {
            path: self.path.clone(),
            source,
        }
    }
}

impl ValuationStore for JsonStore {
    fn kind(&self) -> &'static str {
        "JSON"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &ValuationRecord, policy: WritePolicy) -> Result<(), StoreError> {
        let mut entries = self.read_entries()?;

        if policy == WritePolicy::Upsert {
            let ticker = &record.ticker;
            let before = entries.len();
            entries.retain(|entry| {
                entry
                    .get(TICKER_KEY)
                    .and_then(Value::as_str)
                    .and_then(Ticker::parse)
                    .as_ref()
                    != Some(ticker)
            });
            if entries.len() < before {
                debug!("Replacing {} existing entr(ies) for {}", before - entries.len(), ticker);
            }
        }

        entries.push(serde_json::to_value(record).map_err(|e| self.json_error(e))?);
        self.save_entries(&entries)
    }

    fn load_all(&self) -> Result<Vec<ValuationRecord>, StoreError> {
        let entries = self.read_entries()?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ValuationRecord>(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.path.display(), e);
                    None
                }
            })
            .collect())
    }
}
