//! Batch consumer reading transaction records from JSON or CSV files

use crate::types::transaction::RawTransaction;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV input is missing the {0} column")]
    MissingColumn(&'static str),
}

/// A batch element that could not be decoded into a record.
///
/// It stays in the batch so it can be reported as a failed transaction.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {index} is malformed: {reason}")]
pub struct MalformedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

impl MalformedRecord {
    /// Id to report the record under, falling back to its 1-based position
    pub fn transaction_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("record-{}", self.index + 1))
    }
}

/// One entry of a loaded batch
pub type LoadedRecord = Result<RawTransaction, MalformedRecord>;

/// Input format of a batch file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(InputFormat::Json),
            "csv" => Ok(InputFormat::Csv),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Consumer for loading batches of raw transactions
pub struct TransactionConsumer {
    path: PathBuf,
    format: InputFormat,
}

impl TransactionConsumer {
    /// Create a consumer for `path`, rejecting unknown extensions up front
    pub fn new(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let format = InputFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    /// Read every record of a batch file
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<LoadedRecord>, LoadError> {
        Self::new(path)?.read_all()
    }

    /// Read every record from the configured file
    pub fn read_all(&self) -> Result<Vec<LoadedRecord>, LoadError> {
        let text = fs::read_to_string(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;

        let records = match self.format {
            InputFormat::Json => parse_json(&text)?,
            InputFormat::Csv => parse_csv(&text)?.into_iter().map(Ok).collect(),
        };

        let malformed = records.iter().filter(|r| r.is_err()).count();
        if malformed > 0 {
            warn!(path = %self.path.display(), malformed, "Batch contains malformed records");
        }

        info!(
            path = %self.path.display(),
            format = ?self.format,
            records = records.len(),
            "Loaded transaction batch"
        );
        Ok(records)
    }

    /// Get the input path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }
}

/// Parse a JSON array of raw records.
///
/// Only a document that is not an array fails the load. Each element is
/// decoded on its own, so one bad element yields a `MalformedRecord`
/// instead of discarding the rest of the batch.
pub fn parse_json(text: &str) -> Result<Vec<LoadedRecord>, LoadError> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(text)?;

    let records: Vec<LoadedRecord> = elements
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let id = ["id", "transaction_id"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string);
            serde_json::from_value(value).map_err(|e| MalformedRecord {
                index,
                id,
                reason: e.to_string(),
            })
        })
        .collect();

    debug!(records = records.len(), "Parsed JSON records");
    Ok(records)
}

/// Parse comma-separated rows under a header line.
///
/// Header names match case-insensitively and ignore `_`, so both
/// `timeOfDay` and `time_of_day` work. Unparseable numbers become NaN and
/// are rejected per record during feature extraction.
pub fn parse_csv(text: &str) -> Result<Vec<RawTransaction>, LoadError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };

    let columns: HashMap<String, usize> = split_row(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| (normalize_header(&name), i))
        .collect();

    for required in ["id", "amount", "timeofday", "dayofweek", "customerage"] {
        if !columns.contains_key(required) {
            return Err(LoadError::MissingColumn(required));
        }
    }

    let records: Vec<RawTransaction> = lines
        .map(|line| {
            let cells = split_row(line);
            let row = CsvRow {
                columns: &columns,
                cells: &cells,
            };
            RawTransaction {
                id: row.text("id").unwrap_or_default(),
                amount: row.number("amount"),
                location: row.text("location").unwrap_or_default(),
                device_type: row.text("devicetype").unwrap_or_default(),
                merchant_category: row.text("merchantcategory").unwrap_or_default(),
                time_of_day: row.number("timeofday"),
                day_of_week: row.number("dayofweek"),
                is_weekend: row.flag("isweekend"),
                transaction_frequency: row.number_or("transactionfrequency", 0.0),
                customer_age: row.number("customerage"),
                previous_fraud_flag: row.flag("previousfraudflag").unwrap_or(false),
                merchant: row.text("merchant"),
                timestamp: row.text("timestamp"),
                label: row.flag("label").or_else(|| row.flag("isfraud")),
            }
        })
        .collect();

    debug!(rows = records.len(), "Parsed CSV rows");
    Ok(records)
}

fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split on commas, honouring double-quoted cells with `""` escapes.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

struct CsvRow<'a> {
    columns: &'a HashMap<String, usize>,
    cells: &'a [String],
}

impl CsvRow<'_> {
    fn text(&self, column: &str) -> Option<String> {
        self.columns
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn number(&self, column: &str) -> f64 {
        self.text(column)
            .and_then(|v| v.parse().ok())
            .unwrap_or(f64::NAN)
    }

    fn number_or(&self, column: &str, default: f64) -> f64 {
        match self.text(column) {
            Some(v) => v.parse().unwrap_or(f64::NAN),
            None => default,
        }
    }

    fn flag(&self, column: &str) -> Option<bool> {
        self.text(column)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
    }
}
