//! Banco Central do Brasil time series (SGS).
//!
//! Only the daily SELIC rate (series 11) is used: it is the risk-free leg of
//! the cost of equity once compounded into calendar-year rates.

pub mod selic;

pub use selic::{
    BcbClient, DailyRate, MAX_YEARS_PER_REQUEST, SELIC_DAILY_SERIES, annualize_daily_rates,
    parse_sgs_response, year_blocks,
};
