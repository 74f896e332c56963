use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{write_atomically, StoreError, ValuationStore};
use crate::models::{Ticker, ValuationRecord, ValuationStatus, WritePolicy};

pub const TICKER_COLUMN: &str = "Ticker";
pub const STATUS_COLUMN: &str = "Valuation Status";

const LEADING_COLUMNS: [&str; 5] = [
    TICKER_COLUMN,
    "Company Name",
    "Free Cash Flow",
    "Current Price",
    "DCF Intrinsic Value",
];
const LAST_UPDATED_COLUMN: &str = "Last Updated";

/// Row-per-record CSV file with a fixed header
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    include_status: bool,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, include_status: bool) -> Self {
        Self {
            path: path.into(),
            include_status,
        }
    }

    /// Header in file order; the status column exists only when enabled
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = LEADING_COLUMNS.to_vec();
        if self.include_status {
            columns.push(STATUS_COLUMN);
        }
        columns.push(LAST_UPDATED_COLUMN);
        columns
    }

    fn to_row(&self, record: &ValuationRecord) -> Vec<String> {
        let mut row = vec![
            record.ticker.to_string(),
            record.company_name.clone(),
            format_number(record.free_cash_flow),
            format_number(record.current_price),
            format_number(record.dcf_intrinsic_value),
        ];
        if self.include_status {
            row.push(
                record
                    .valuation_status
                    .map(|status| status.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(record.last_updated.clone());
        row
    }

    fn from_row(&self, row: &[String]) -> Option<ValuationRecord> {
        let ticker = Ticker::parse(row.first()?)?;
        let (valuation_status, last_updated) = if self.include_status {
            (row.get(5)?.parse::<ValuationStatus>().ok(), row.get(6)?)
        } else {
            (None, row.get(5)?)
        };

        Some(ValuationRecord {
            ticker,
            company_name: row.get(1)?.clone(),
            free_cash_flow: parse_number(row.get(2)?),
            current_price: parse_number(row.get(3)?),
            dcf_intrinsic_value: parse_number(row.get(4)?),
            valuation_status,
            last_updated: last_updated.clone(),
        })
    }

    /// Existing rows re-mapped onto the current column set by header name
    fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers().map_err(|e| self.csv_error(e))?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Ok(Vec::new());
        }

        let positions: Vec<Option<usize>> = self
            .columns()
            .iter()
            .map(|column| headers.iter().position(|h| h.trim() == *column))
            .collect();
        if positions[0].is_none() {
            return Err(StoreError::MissingColumn {
                path: self.path.clone(),
                column: TICKER_COLUMN,
            });
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record: StringRecord = result.map_err(|e| self.csv_error(e))?;
            rows.push(
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| record.get(i))
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect(),
            );
        }
        Ok(rows)
    }

    /// Header of the existing file, `None` when there is no file or it is blank
    fn existing_header(&self) -> Result<Option<StringRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers().map_err(|e| self.csv_error(e))?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            Ok(None)
        } else {
            Ok(Some(headers))
        }
    }

    /// Lay `row` out in the order of an existing header; unknown columns stay empty
    fn align_to_header(&self, header: &StringRecord, row: &[String]) -> Result<Vec<String>, StoreError> {
        let columns = self.columns();
        if !header.iter().any(|h| h.trim() == TICKER_COLUMN) {
            return Err(StoreError::MissingColumn {
                path: self.path.clone(),
                column: TICKER_COLUMN,
            });
        }

        Ok(header
            .iter()
            .map(|h| {
                columns
                    .iter()
                    .position(|column| *column == h.trim())
                    .and_then(|i| row.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    fn append_row(&self, row: &[String]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let header = self.existing_header()?;
        let row = match &header {
            Some(header) => self.align_to_header(header, row)?,
            None => row.to_vec(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if header.is_none() {
            writer
                .write_record(self.columns())
                .map_err(|e| self.csv_error(e))?;
        }
        writer.write_record(&row).map_err(|e| self.csv_error(e))?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))
    }

    fn upsert_row(&self, ticker: &Ticker, row: Vec<String>) -> Result<(), StoreError> {
        let mut rows = self.read_rows()?;
        let before = rows.len();
        rows.retain(|existing| Ticker::parse(&existing[0]).as_ref() != Some(ticker));
        if rows.len() < before {
            debug!("Replacing {} existing row(s) for {}", before - rows.len(), ticker);
        }
        rows.push(row);

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        writer
            .write_record(self.columns())
            .map_err(|e| self.csv_error(e))?;
        for row in &rows {
            writer.write_record(row).map_err(|e| self.csv_error(e))?;
        }
        let contents = writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, e.into_error()))?;

        write_atomically(&self.path, &contents)
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl ValuationStore for CsvStore {
    fn kind(&self) -> &'static str {
        "CSV"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, record: &ValuationRecord, policy: WritePolicy) -> Result<(), StoreError> {
        let row = self.to_row(record);
        match policy {
            WritePolicy::Append => self.append_row(&row),
            WritePolicy::Upsert => self.upsert_row(&record.ticker, row),
        }
    }

    fn load_all(&self) -> Result<Vec<ValuationRecord>, StoreError> {
        let rows = self.read_rows()?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.from_row(row) {
                Some(record) => records.push(record),
                None => warn!("Skipping unreadable row in {}: {:?}", self.path.display(), row),
            }
        }
        Ok(records)
    }
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        cell.parse().ok()
    }
}
