//! Report generation for the bank study.

use crate::export::BankValuation;
use crate::pivot::{PivotMetric, PivotTable};
use crate::summary::summary_markdown_table;
use chrono::{DateTime, Utc};
use recife_valuation::{BankSummary, summarize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The report has no study period.
    #[error("Missing report period")]
    MissingPeriod,

    /// The period ends before it starts.
    #[error("Invalid report period: {start}-{end}")]
    InvalidPeriod {
        /// First year
        start: i32,
        /// Last year
        end: i32,
    },
}

/// Excess return report over a set of banks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// First year of the study period.
    pub start_year: i32,

    /// Last year of the study period.
    pub end_year: i32,

    /// Per-bank aggregates, in bank order.
    pub summaries: Vec<BankSummary>,

    /// Per-bank rows, in bank order.
    pub valuations: Vec<BankValuation>,
}

impl Report {
    /// Create a new report, summarizing every bank with at least one row.
    pub fn new(start_year: i32, end_year: i32, valuations: Vec<BankValuation>) -> Self {
        let summaries = valuations
            .iter()
            .filter_map(|v| summarize(&v.bank, &v.rows))
            .collect();

        Self {
            timestamp: Utc::now(),
            start_year,
            end_year,
            summaries,
            valuations,
        }
    }

    /// Names of the banks in the report.
    pub fn banks(&self) -> Vec<&str> {
        self.valuations.iter().map(|v| v.bank.as_str()).collect()
    }

    /// Pivot one metric across banks.
    pub fn pivot(&self, metric: PivotMetric) -> PivotTable {
        PivotTable::from_rows(metric, &self.valuations)
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the report as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Excess Return: ROE vs. Ke\n\n");
        output.push_str(&format!(
            "**Period:** {}-{}  \n**Generated:** {}\n\n",
            self.start_year,
            self.end_year,
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
        output.push_str("Ke = Rf + β (Rm - Rf), with Rf the compounded annual SELIC and Rm the annual IBOV return. ");
        output.push_str("ROE is net income over opening controlling equity.\n\n");

        output.push_str("## Summary\n\n");
        output.push_str(&summary_markdown_table(&self.summaries));
        output.push('\n');

        for metric in PivotMetric::BUNDLED {
            output.push_str(&self.pivot(metric).to_markdown());
            output.push('\n');
        }

        for valuation in &self.valuations {
            output.push_str(&valuation.to_markdown());
            output.push('\n');
        }

        output
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    period: Option<(i32, i32)>,
    valuations: Vec<BankValuation>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the study period.
    pub const fn period(mut self, start_year: i32, end_year: i32) -> Self {
        self.period = Some((start_year, end_year));
        self
    }

    /// Add one bank's valuation.
    pub fn valuation(mut self, valuation: BankValuation) -> Self {
        self.valuations.push(valuation);
        self
    }

    /// Add several banks' valuations.
    pub fn valuations(mut self, valuations: impl IntoIterator<Item = BankValuation>) -> Self {
        self.valuations.extend(valuations);
        self
    }

    /// Build the report.
    pub fn build(self) -> Result<Report, ReportError> {
        let (start, end) = self.period.ok_or(ReportError::MissingPeriod)?;
        if start > end {
            return Err(ReportError::InvalidPeriod { start, end });
        }
        Ok(Report::new(start, end, self.valuations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recife_valuation::ValuationRow;

    fn valuation(bank: &str, years: &[i32]) -> BankValuation {
        let rows = years
            .iter()
            .map(|&year| ValuationRow {
                year,
                net_income: 10.0,
                equity: 110.0,
                opening_equity: 100.0,
                roe: 0.10,
                beta: 1.0,
                rf: 0.10,
                rm: 0.12,
                equity_risk_premium: 0.02,
                ke: 0.12,
                spread: -0.02,
                excess_return: -2.0,
            })
            .collect();
        BankValuation::new(bank.to_string(), format!("{}.SA", bank), rows)
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .period(2010, 2024)
            .valuation(valuation("ITUB4", &[2022, 2023]))
            .valuations(vec![valuation("BBDC4", &[2023]), valuation("SANB11", &[])])
            .build()
            .unwrap();

        assert_eq!(report.start_year, 2010);
        assert_eq!(report.banks(), vec!["ITUB4", "BBDC4", "SANB11"]);
        // Banks without rows have no summary
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.summaries[0].years, 2);
    }

    #[test]
    fn test_report_requires_valid_period() {
        assert!(matches!(
            ReportBuilder::new().build(),
            Err(ReportError::MissingPeriod)
        ));
        assert!(matches!(
            ReportBuilder::new().period(2024, 2010).build(),
            Err(ReportError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_report_json_and_markdown() {
        let report = Report::new(2021, 2023, vec![valuation("ITUB4", &[2022, 2023])]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"start_year\": 2021"));
        assert!(json.contains("\"summaries\""));
        assert!(json.contains("\"valuations\""));

        let markdown = report.to_markdown();
        assert!(markdown.starts_with("# Excess Return: ROE vs. Ke"));
        assert!(markdown.contains("**Period:** 2021-2023"));
        assert!(markdown.contains("## ROE Comparativo"));
        assert!(markdown.contains("## Ke Comparativo"));
        assert!(markdown.contains("## ITUB4 (ITUB4.SA)"));
    }
}
