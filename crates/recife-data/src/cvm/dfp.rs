//! DFP archive decoding.
//!
//! Each yearly archive holds one CSV per statement and consolidation level,
//! e.g. `dfp_cia_aberta_DRE_con_2023.csv` (consolidated income statement) and
//! `dfp_cia_aberta_BPP_ind_2023.csv` (individual balance sheet, liabilities).

use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Statement types read from the DFP archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// Income statement (DRE)
    Income,
    /// Balance sheet, liabilities and equity side (BPP)
    BalanceSheetLiabilities,
}

impl StatementKind {
    /// File-name prefix used by CVM for this statement.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Income => "DRE",
            Self::BalanceSheetLiabilities => "BPP",
        }
    }

    /// Parse from the CVM prefix / database representation.
    pub fn from_prefix(s: &str) -> Result<Self> {
        match s {
            "DRE" => Ok(Self::Income),
            "BPP" => Ok(Self::BalanceSheetLiabilities),
            _ => Err(DataError::Parse(format!("Invalid statement kind: {}", s))),
        }
    }
}

/// Which fiscal year a DFP row refers to, relative to the filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiscalOrder {
    /// The filing's own fiscal year (`ÚLTIMO`)
    Last,
    /// The comparative prior year (`PENÚLTIMO`)
    Previous,
}

impl FiscalOrder {
    /// Parse the `ORDEM_EXERC` column.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ÚLTIMO" | "ULTIMO" => Ok(Self::Last),
            "PENÚLTIMO" | "PENULTIMO" => Ok(Self::Previous),
            other => Err(DataError::Parse(format!("Invalid ORDEM_EXERC: {}", other))),
        }
    }
}

/// One account line of a DFP statement, with the value scaled to BRL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfpRecord {
    /// Statement the line belongs to
    pub kind: StatementKind,
    /// Company CNPJ as published (`60.872.504/0001-23`)
    pub cnpj: String,
    /// Reference date of the filing
    pub reference_date: NaiveDate,
    /// End of the fiscal period, when published
    pub period_end: Option<NaiveDate>,
    /// Fiscal year order
    pub order: FiscalOrder,
    /// Hierarchical account code (`2.08.09`)
    pub account_code: String,
    /// Account description
    pub description: String,
    /// Value in BRL
    pub value: f64,
}

impl DfpRecord {
    /// Fiscal year of the line, taken from the reference date.
    pub fn year(&self) -> i32 {
        self.reference_date.year()
    }

    /// Depth of the account in the chart of accounts (`3.11` -> 1).
    pub fn account_depth(&self) -> usize {
        self.account_code.matches('.').count()
    }
}

#[derive(Debug, Deserialize)]
struct RawDfpRow {
    #[serde(rename = "CNPJ_CIA")]
    cnpj: String,
    #[serde(rename = "DT_REFER")]
    reference_date: String,
    #[serde(rename = "DT_FIM_EXERC", default)]
    period_end: Option<String>,
    #[serde(rename = "ESCALA_MOEDA", default)]
    scale: Option<String>,
    #[serde(rename = "ORDEM_EXERC")]
    order: String,
    #[serde(rename = "CD_CONTA")]
    account_code: String,
    #[serde(rename = "DS_CONTA")]
    description: String,
    #[serde(rename = "VL_CONTA")]
    value: String,
}

impl RawDfpRow {
    fn into_record(self, kind: StatementKind) -> Result<DfpRecord> {
        let reference_date = parse_date(&self.reference_date)?;
        let period_end = match self.period_end.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(s) => Some(parse_date(s)?),
        };
        let multiplier = scale_multiplier(self.scale.as_deref())?;
        let value = self
            .value
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|e| DataError::Parse(format!("VL_CONTA '{}': {}", self.value, e)))?;

        Ok(DfpRecord {
            kind,
            cnpj: self.cnpj.trim().to_string(),
            reference_date,
            period_end,
            order: FiscalOrder::parse(&self.order)?,
            account_code: self.account_code.trim().to_string(),
            description: self.description.trim().to_string(),
            value: value * multiplier,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("date '{}': {}", s, e)))
}

/// `ESCALA_MOEDA`: values are published in thousands unless stated otherwise.
fn scale_multiplier(scale: Option<&str>) -> Result<f64> {
    match scale.map(|s| s.trim().to_uppercase()).as_deref() {
        None | Some("") | Some("MIL") => Ok(1_000.0),
        Some("UNIDADE") => Ok(1.0),
        Some(other) => Err(DataError::Parse(format!("Unknown ESCALA_MOEDA: {}", other))),
    }
}

/// CVM files are Latin-1; fall back to it when the bytes are not UTF-8.
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Parse a DFP statement CSV into records.
pub fn parse_dfp_csv(bytes: &[u8], kind: StatementKind) -> Result<Vec<DfpRecord>> {
    parse_dfp_csv_filtered(bytes, kind, |_| true)
}

/// Parse the rows of a DFP statement CSV whose `CNPJ_CIA` passes `keep`.
///
/// Rows of other companies are never converted. Malformed rows are skipped
/// and counted; the statement fails only when no row at all is readable.
pub fn parse_dfp_csv_filtered(
    bytes: &[u8],
    kind: StatementKind,
    keep: impl Fn(&str) -> bool,
) -> Result<Vec<DfpRecord>> {
    let text = decode_text(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut last_error = None;
    for row in reader.deserialize::<RawDfpRow>() {
        let record = match row {
            Ok(row) if !keep(&row.cnpj) => continue,
            Ok(row) => row.into_record(kind),
            Err(e) => Err(e.into()),
        };
        match record {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(kind = kind.prefix(), error = %e, "skipping malformed DFP row");
                skipped += 1;
                last_error = Some(e);
            }
        }
    }

    if skipped > 0 {
        if records.is_empty()
            && let Some(e) = last_error
        {
            return Err(e);
        }
        warn!(kind = kind.prefix(), skipped, kept = records.len(), "skipped malformed DFP rows");
    }

    Ok(records)
}

/// A downloaded yearly DFP archive.
pub struct DfpArchive {
    year: i32,
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl DfpArchive {
    /// Open an archive from its raw bytes.
    pub fn from_bytes(year: i32, bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        Ok(Self { year, archive })
    }

    /// Fiscal year of the archive.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Names of all entries in the archive.
    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Entry holding the consolidated version of a statement, if any.
    pub fn consolidated_entry(&self, kind: StatementKind) -> Option<String> {
        let mut names = self.entry_names();
        names.sort();
        names
            .into_iter()
            .find(|name| name.contains(kind.prefix()) && name.to_lowercase().contains("con"))
    }

    /// Decode the consolidated statement of the given kind.
    ///
    /// Returns an empty vector when the archive has no such statement.
    pub fn statement(&mut self, kind: StatementKind) -> Result<Vec<DfpRecord>> {
        self.statement_for(kind, |_| true)
    }

    /// Decode the consolidated statement rows of the companies `keep` accepts.
    pub fn statement_for(
        &mut self,
        kind: StatementKind,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Vec<DfpRecord>> {
        let Some(name) = self.consolidated_entry(kind) else {
            debug!(year = self.year, kind = kind.prefix(), "statement not in archive");
            return Ok(Vec::new());
        };

        let mut raw = Vec::new();
        self.archive.by_name(&name)?.read_to_end(&mut raw)?;

        let records = parse_dfp_csv_filtered(&raw, kind, keep)?;
        debug!(year = self.year, entry = %name, rows = records.len(), "decoded statement");
        Ok(records)
    }
}

impl std::fmt::Debug for DfpArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfpArchive")
            .field("year", &self.year)
            .field("entries", &self.archive.len())
            .finish()
    }
}
