//! Bulk prediction importer.
//!
//! Takes an uploaded CSV, classifies each data row independently, and stages
//! the successful rows for a single-transaction commit. A bad row never aborts
//! the batch: it becomes an error entry in the ordered report and processing
//! continues. File-level problems (wrong extension, non-UTF-8 bytes, CSV the
//! parser cannot read at all) short-circuit before any row is processed.
//!
//! Recognized columns: customer_name, tenure, monthly_charges, total_charges,
//! contract_type, payment_method. Anything else is ignored. A missing column
//! falls back to a default; a present value that fails to parse is a row error.

use crate::db::models::predictions::PredictionCreateDBRequest;
use crate::ml::{Classifier, CustomerProfile};
use crate::types::UserId;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use utoipa::ToSchema;

/// First data row of a CSV, 1-indexed (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

/// File-level import failures. These are reported to the user as a single
/// message with an empty row report.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No file selected")]
    MissingFile,

    #[error("File must be a CSV")]
    NotCsv,

    #[error("File must be UTF-8 encoded")]
    NotUtf8,

    #[error("Could not read CSV file: {0}")]
    Unreadable(String),
}

impl From<ImportError> for crate::errors::Error {
    fn from(err: ImportError) -> Self {
        crate::errors::Error::BadRequest { message: err.to_string() }
    }
}

/// Outcome for one data row, in input order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RowReport {
    /// 1-indexed row number in the uploaded file (data starts at 2)
    pub row: usize,
    pub customer_name: String,
    #[serde(flatten)]
    pub status: RowStatus,
}

/// Success or error for a single row
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowStatus {
    Success {
        prediction: i32,
        probability: f64,
        risk_score: i32,
    },
    Error {
        message: String,
    },
}

/// Full result of processing one uploaded file
#[derive(Debug)]
pub struct ImportOutcome {
    pub success_count: usize,
    pub error_count: usize,
    /// Per-row results, mirroring input order
    pub rows: Vec<RowReport>,
    /// Staged records for the successful rows, to be committed in one transaction
    pub staged: Vec<PredictionCreateDBRequest>,
}

/// Reject filenames that are empty or lack a `.csv` extension.
pub fn validate_filename(filename: &str) -> Result<(), ImportError> {
    if filename.is_empty() {
        return Err(ImportError::MissingFile);
    }
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(ImportError::NotCsv);
    }
    Ok(())
}

/// Process a whole uploaded file.
///
/// Guarantees `success_count + error_count == number of data rows` and that
/// `staged.len() == success_count`, with `rows` in input order.
pub fn process_batch(data: &[u8], classifier: &dyn Classifier, owner: UserId) -> Result<ImportOutcome, ImportError> {
    let text = std::str::from_utf8(data).map_err(|_| ImportError::NotUtf8)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(|e| ImportError::Unreadable(e.to_string()))?.clone();
    let columns: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, name)| (name, i)).collect();

    // Read the whole file up front so a malformed record is a file-level
    // error rather than a truncated batch.
    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let mut rows = Vec::with_capacity(records.len());
    let mut staged = Vec::new();
    let mut success_count = 0;
    let mut error_count = 0;

    for (offset, record) in records.iter().enumerate() {
        let row_number = FIRST_DATA_ROW + offset;
        let customer_name = text_field(&columns, record, "customer_name")
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Customer {row_number}"));

        match parse_profile(&columns, record) {
            Ok(profile) => {
                let outcome = classifier.predict(&profile);
                rows.push(RowReport {
                    row: row_number,
                    customer_name: customer_name.clone(),
                    status: RowStatus::Success {
                        prediction: outcome.prediction,
                        probability: outcome.probability,
                        risk_score: outcome.risk_score,
                    },
                });
                staged.push(PredictionCreateDBRequest::new(owner, customer_name, profile, outcome));
                success_count += 1;
            }
            Err(message) => {
                rows.push(RowReport {
                    row: row_number,
                    customer_name,
                    status: RowStatus::Error { message },
                });
                error_count += 1;
            }
        }
    }

    Ok(ImportOutcome {
        success_count,
        error_count,
        rows,
        staged,
    })
}

fn text_field<'r>(columns: &HashMap<&str, usize>, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
    columns.get(name).and_then(|&idx| record.get(idx))
}

fn numeric_field(columns: &HashMap<&str, usize>, record: &csv::StringRecord, name: &str) -> Result<f64, String> {
    match text_field(columns, record, name) {
        // Column absent (or the row is short): default applies
        None => Ok(0.0),
        Some(raw) => {
            let value: f64 = raw.parse().map_err(|_| format!("invalid {name} value '{raw}'"))?;
            if value < 0.0 {
                return Err(format!("{name} must not be negative, got {value}"));
            }
            Ok(value)
        }
    }
}

fn parse_profile(columns: &HashMap<&str, usize>, record: &csv::StringRecord) -> Result<CustomerProfile, String> {
    let tenure = numeric_field(columns, record, "tenure")?;
    let monthly_charges = numeric_field(columns, record, "monthly_charges")?;
    let total_charges = numeric_field(columns, record, "total_charges")?;

    let contract_type = text_field(columns, record, "contract_type")
        .filter(|v| !v.is_empty())
        .unwrap_or("Month-to-month")
        .to_string();
    let payment_method = text_field(columns, record, "payment_method")
        .filter(|v| !v.is_empty())
        .unwrap_or("Electronic check")
        .to_string();

    Ok(CustomerProfile {
        tenure,
        monthly_charges,
        total_charges,
        contract_type,
        payment_method,
    })
}
