//! Price series resampling: month-end closes, monthly and calendar-year returns.

use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;

/// `(year, month)` key of a monthly observation.
pub type MonthKey = (i32, u32);

/// Adjusted close prices of one symbol, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    /// Build a series, dropping non-positive or non-finite prices.
    pub fn new(symbol: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.retain(|(_, price)| price.is_finite() && *price > 0.0);
        points.sort_by_key(|(date, _)| *date);
        points.dedup_by_key(|(date, _)| *date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    /// Extract the `adjusted_close` column of a quote frame.
    ///
    /// Expects the columns produced by
    /// [`YahooQuoteProvider::fetch_quotes`](crate::yahoo::YahooQuoteProvider::fetch_quotes):
    /// `symbol`, `date` and `adjusted_close`.
    pub fn from_quotes(df: &DataFrame) -> Result<Self> {
        let symbols = df.column("symbol")?.str()?;
        let symbol = symbols
            .get(0)
            .ok_or_else(|| DataError::Parse("Empty quote frame".to_string()))?
            .to_string();

        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let prices = df.column("adjusted_close")?.f64()?;

        let mut points = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(date), Some(price)) = (dates.get(i), prices.get(i)) else {
                continue;
            };
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("quote date '{}': {}", date, e)))?;
            points.push((date, price));
        }

        Ok(Self::new(symbol, points))
    }

    /// Symbol of the series.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Observations, oldest first.
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last observation of each calendar month.
    pub fn month_end(&self) -> BTreeMap<MonthKey, f64> {
        let mut closes = BTreeMap::new();
        for (date, price) in &self.points {
            closes.insert((date.year(), date.month()), *price);
        }
        closes
    }

    /// Simple returns between consecutive month-end closes.
    ///
    /// A month whose predecessor is missing has no return.
    pub fn monthly_returns(&self) -> BTreeMap<MonthKey, f64> {
        let closes = self.month_end();
        closes
            .iter()
            .filter_map(|(&key, &close)| {
                let previous = closes.get(&previous_month(key))?;
                Some((key, close / previous - 1.0))
            })
            .collect()
    }

    /// Calendar-year returns: last close of the year over first close of the year.
    pub fn annual_returns(&self) -> BTreeMap<i32, f64> {
        let mut bounds: BTreeMap<i32, (f64, f64)> = BTreeMap::new();
        for (date, price) in &self.points {
            bounds
                .entry(date.year())
                .and_modify(|(_, last)| *last = *price)
                .or_insert((*price, *price));
        }
        bounds
            .into_iter()
            .map(|(year, (first, last))| (year, last / first - 1.0))
            .collect()
    }
}

/// The calendar month before `key`.
pub const fn previous_month((year, month): MonthKey) -> MonthKey {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
