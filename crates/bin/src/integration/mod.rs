//! Integration of the data, valuation and output crates.
//!
//! Downloads go through a shared SQLite cache; the pipeline turns them into
//! a report for the configured banks.

pub(crate) mod cache_manager;
pub(crate) mod market;
pub(crate) mod pipeline;
pub(crate) mod statements;
