//! Export functionality for valuation tables.
//!
//! This module provides CSV and JSON export for per-bank valuation rows,
//! the consolidated multi-bank table and per-bank summaries.

use recife_valuation::{BankSummary, ValuationRow};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized CSV was not valid UTF-8.
    #[error("Invalid UTF-8 in CSV output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Report serialization error.
    #[error("Report error: {0}")]
    Report(#[from] crate::report::ReportError),

    /// Chart rendering error.
    #[error("Chart error: {0}")]
    Chart(String),

    /// A bank name yields no usable file name, or the same one as another bank.
    #[error("Cannot derive a distinct file name for bank '{0}'")]
    FileName(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// Valuation history of one bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankValuation {
    /// Bank name.
    pub bank: String,

    /// Exchange ticker.
    pub ticker: String,

    /// Priced years, oldest first.
    pub rows: Vec<ValuationRow>,
}

impl BankValuation {
    /// Create a new bank valuation.
    pub const fn new(bank: String, ticker: String, rows: Vec<ValuationRow>) -> Self {
        Self { bank, ticker, rows }
    }

    /// Rows tagged with the bank, for the consolidated table.
    pub fn consolidated_rows(&self) -> Vec<ConsolidatedRow> {
        self.rows
            .iter()
            .map(|row| ConsolidatedRow::new(&self.bank, &self.ticker, row))
            .collect()
    }
}

/// One bank-year of the consolidated table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedRow {
    /// Bank name.
    pub bank: String,
    /// Exchange ticker.
    pub ticker: String,
    /// Fiscal year.
    pub year: i32,
    /// Net income, BRL.
    pub net_income: f64,
    /// Equity at year end, BRL.
    pub equity: f64,
    /// Equity at the previous year end, BRL.
    pub opening_equity: f64,
    /// Return on opening equity.
    pub roe: f64,
    /// Equity beta.
    pub beta: f64,
    /// Risk-free rate.
    pub rf: f64,
    /// Market return.
    pub rm: f64,
    /// Equity risk premium.
    pub equity_risk_premium: f64,
    /// Cost of equity.
    pub ke: f64,
    /// Value spread.
    pub spread: f64,
    /// Excess return, BRL.
    pub excess_return: f64,
}

impl ConsolidatedRow {
    /// Tag a valuation row with its bank.
    pub fn new(bank: &str, ticker: &str, row: &ValuationRow) -> Self {
        Self {
            bank: bank.to_string(),
            ticker: ticker.to_string(),
            year: row.year,
            net_income: row.net_income,
            equity: row.equity,
            opening_equity: row.opening_equity,
            roe: row.roe,
            beta: row.beta,
            rf: row.rf,
            rm: row.rm,
            equity_risk_premium: row.equity_risk_premium,
            ke: row.ke,
            spread: row.spread,
            excess_return: row.excess_return,
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Serialize records as CSV with a header row.
pub(crate) fn records_to_csv<'a, T, I>(records: I) -> Result<String, ExportError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn export_records<T: Serialize>(records: &[T], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => records_to_csv(records),
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

impl Exporter for Vec<ValuationRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for Vec<ConsolidatedRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for Vec<BankSummary> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for BankValuation {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => records_to_csv(&self.rows),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
