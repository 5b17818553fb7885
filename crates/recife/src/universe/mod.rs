//! Universe management for the bank study.
//!
//! This module provides the set of tracked banks with their exchange
//! tickers and CNPJs.

pub mod banks;

pub use banks::{Bank, BankUniverse};

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe.
    fn symbols(&self) -> Vec<String>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().contains(&symbol.to_string())
    }

    /// Get the number of constituents.
    fn size(&self) -> usize {
        self.symbols().len()
    }
}

impl Universe for BankUniverse {
    fn symbols(&self) -> Vec<String> {
        self.tickers()
    }
}
