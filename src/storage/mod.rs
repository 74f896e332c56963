//! Valuation persistence
//!
//! Two file-backed stores share one contract: `write` applies a record under a
//! `WritePolicy`, `load_all` reads every record back. Neither store locks its
//! file, so all writes in a batch go through the single writer task in `writer`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{ValuationRecord, WritePolicy};

pub mod csv_store;
pub mod json_store;
pub mod writer;

pub use csv_store::CsvStore;
pub use json_store::JsonStore;
pub use writer::{StoreWriterHandle, WriteReport};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A destination for valuation records
pub trait ValuationStore: Send {
    /// Short label used in log lines
    fn kind(&self) -> &'static str;

    fn path(&self) -> &Path;

    /// Persist one record under the given policy
    fn write(&self, record: &ValuationRecord, policy: WritePolicy) -> Result<(), StoreError>;

    /// Every record currently in the store, in file order
    fn load_all(&self) -> Result<Vec<ValuationRecord>, StoreError>;
}

/// Replace `path` with `contents` via a sibling temp file and rename
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).map_err(|e| StoreError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(path, e)
    })
}
