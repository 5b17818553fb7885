//! Per-bank aggregates over valuation rows.

use crate::capm::ValuationRow;
use serde::{Deserialize, Serialize};

/// Aggregate view of one bank's valuation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSummary {
    /// Bank name
    pub bank: String,
    /// Number of priced years
    pub years: usize,
    /// First priced year
    pub first_year: i32,
    /// Last priced year
    pub last_year: i32,
    /// Equity beta used for every year
    pub beta: f64,
    /// Mean ROE
    pub mean_roe: f64,
    /// Mean cost of equity
    pub mean_ke: f64,
    /// Mean value spread
    pub mean_spread: f64,
    /// Years in which ROE exceeded Ke
    pub positive_spread_years: usize,
    /// Sum of yearly excess returns, BRL
    pub cumulative_excess_return: f64,
}

impl BankSummary {
    /// Share of priced years with a positive spread.
    pub fn positive_spread_ratio(&self) -> f64 {
        if self.years == 0 {
            0.0
        } else {
            self.positive_spread_years as f64 / self.years as f64
        }
    }
}

/// Summarize a bank's rows. Returns `None` when there are no rows.
pub fn summarize(bank: &str, rows: &[ValuationRow]) -> Option<BankSummary> {
    let first = rows.first()?;
    let n = rows.len() as f64;
    let mean = |f: fn(&ValuationRow) -> f64| rows.iter().map(f).sum::<f64>() / n;

    Some(BankSummary {
        bank: bank.to_string(),
        years: rows.len(),
        first_year: rows.iter().map(|r| r.year).min().unwrap_or(first.year),
        last_year: rows.iter().map(|r| r.year).max().unwrap_or(first.year),
        beta: first.beta,
        mean_roe: mean(|r| r.roe),
        mean_ke: mean(|r| r.ke),
        mean_spread: mean(|r| r.spread),
        positive_spread_years: rows.iter().filter(|r| r.spread > 0.0).count(),
        cumulative_excess_return: rows.iter().map(|r| r.excess_return).sum(),
    })
}
