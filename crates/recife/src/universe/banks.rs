//! Tracked Brazilian banks.

use serde::{Deserialize, Serialize};

/// A listed bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// Display name.
    pub name: String,
    /// Yahoo Finance ticker (`ITUB4.SA`).
    pub ticker: String,
    /// CNPJ of the listed holding, as published by CVM.
    pub cnpj: String,
}

impl Bank {
    /// Create a new bank.
    pub fn new(
        name: impl Into<String>,
        ticker: impl Into<String>,
        cnpj: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ticker: ticker.into(),
            cnpj: cnpj.into(),
        }
    }

    /// Ticker without the `.SA` exchange suffix.
    pub fn b3_code(&self) -> &str {
        self.ticker.strip_suffix(".SA").unwrap_or(&self.ticker)
    }
}

/// Ordered set of tracked banks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankUniverse {
    banks: Vec<Bank>,
}

impl BankUniverse {
    /// The four largest listed Brazilian banks.
    pub fn new() -> Self {
        Self::from_banks(Self::default_banks())
    }

    /// Universe with custom banks, in the given order.
    pub const fn from_banks(banks: Vec<Bank>) -> Self {
        Self { banks }
    }

    /// Default banks.
    pub fn default_banks() -> Vec<Bank> {
        vec![
            Bank::new("Itaú Unibanco", "ITUB4.SA", "60.872.504/0001-23"),
            Bank::new("Bradesco", "BBDC4.SA", "60.746.948/0001-12"),
            Bank::new("Banco do Brasil", "BBAS3.SA", "00.000.000/0001-91"),
            Bank::new("Santander BR", "SANB11.SA", "90.400.888/0001-42"),
        ]
    }

    /// All banks, in universe order.
    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    /// Tickers, in universe order.
    pub fn tickers(&self) -> Vec<String> {
        self.banks.iter().map(|b| b.ticker.clone()).collect()
    }

    /// Number of banks.
    pub fn len(&self) -> usize {
        self.banks.len()
    }

    /// Whether the universe is empty.
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Look a bank up by ticker (with or without `.SA`) or by name,
    /// ignoring case.
    pub fn find(&self, query: &str) -> Option<&Bank> {
        let query = query.trim();
        self.banks.iter().find(|b| {
            b.ticker.eq_ignore_ascii_case(query)
                || b.b3_code().eq_ignore_ascii_case(query)
                || b.name.to_lowercase() == query.to_lowercase()
        })
    }
}

impl Default for BankUniverse {
    fn default() -> Self {
        Self::new()
    }
}
