//! Year x bank comparison tables.

use crate::export::{BankValuation, ExportError, ExportFormat, Exporter};
use recife_valuation::ValuationRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Metric shown in a pivot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotMetric {
    /// Return on opening equity
    Roe,
    /// Cost of equity
    Ke,
    /// Value spread
    Spread,
    /// Excess return in BRL
    ExcessReturn,
}

impl PivotMetric {
    /// Metrics written to the report bundle.
    pub const BUNDLED: [Self; 4] = [Self::Roe, Self::Spread, Self::Ke, Self::ExcessReturn];

    /// Table title.
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Roe => "ROE Comparativo",
            Self::Ke => "Ke Comparativo",
            Self::Spread => "Spread de Valor",
            Self::ExcessReturn => "Excess Return",
        }
    }

    /// Output file stem.
    pub const fn file_stem(&self) -> &'static str {
        match self {
            Self::Roe => "roe_comparativo",
            Self::Ke => "ke_comparativo",
            Self::Spread => "spread_valor",
            Self::ExcessReturn => "excess_return",
        }
    }

    /// Whether the metric is a rate rather than a BRL amount.
    pub const fn is_rate(&self) -> bool {
        !matches!(self, Self::ExcessReturn)
    }

    /// Read the metric from a valuation row.
    pub const fn value(&self, row: &ValuationRow) -> f64 {
        match self {
            Self::Roe => row.roe,
            Self::Ke => row.ke,
            Self::Spread => row.spread,
            Self::ExcessReturn => row.excess_return,
        }
    }
}

/// One year of a pivot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    /// Fiscal year
    pub year: i32,
    /// One cell per bank, in column order
    pub values: Vec<Option<f64>>,
}

/// A metric laid out with years as rows and banks as columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotTable {
    /// Metric in the cells
    pub metric: PivotMetric,
    /// Column headers
    pub banks: Vec<String>,
    /// Rows, oldest year first
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// Pivot the valuations of several banks.
    ///
    /// Columns follow the order of `valuations`. Every year priced for at
    /// least one bank gets a row; banks without that year have an empty cell.
    pub fn from_rows(metric: PivotMetric, valuations: &[BankValuation]) -> Self {
        let years: BTreeSet<i32> = valuations
            .iter()
            .flat_map(|v| v.rows.iter().map(|r| r.year))
            .collect();

        let by_bank: Vec<BTreeMap<i32, f64>> = valuations
            .iter()
            .map(|v| v.rows.iter().map(|r| (r.year, metric.value(r))).collect())
            .collect();

        let rows = years
            .into_iter()
            .map(|year| PivotRow {
                year,
                values: by_bank.iter().map(|m| m.get(&year).copied()).collect(),
            })
            .collect();

        Self {
            metric,
            banks: valuations.iter().map(|v| v.bank.clone()).collect(),
            rows,
        }
    }

    /// Cell for a year and bank, if present.
    pub fn get(&self, year: i32, bank: &str) -> Option<f64> {
        let column = self.banks.iter().position(|b| b == bank)?;
        self.rows
            .iter()
            .find(|r| r.year == year)
            .and_then(|r| r.values.get(column).copied().flatten())
    }

    fn to_csv(&self) -> Result<String, ExportError> {
        let mut wtr = csv::Writer::from_writer(vec![]);

        let mut header = vec!["year".to_string()];
        header.extend(self.banks.iter().cloned());
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.year.to_string()];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&record)?;
        }

        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl Exporter for PivotTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
