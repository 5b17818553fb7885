//! Yahoo Finance price data for bank tickers and the IBOV index.

pub mod prices;
pub mod quotes;

pub use prices::{MonthKey, PriceSeries, previous_month};
pub use quotes::{IBOV_SYMBOL, YahooQuoteProvider};
