//! Quote data fetching from Yahoo Finance.

use crate::error::{DataError, Result};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Ticker of the Bovespa index on Yahoo Finance.
pub const IBOV_SYMBOL: &str = "^BVSP";

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a new Yahoo Finance quote provider with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a new Yahoo Finance quote provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily quotes for a single symbol.
    ///
    /// # Arguments
    /// * `symbol` - The ticker symbol (e.g., "ITUB4.SA", "^BVSP")
    /// * `start` - Start date for the data
    /// * `end` - End date for the data
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, close, adjusted_close
    pub async fn fetch_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DataFrame> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }

        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        // Convert chrono DateTime to time::OffsetDateTime
        let start_time = time::OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;
        let end_time = time::OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| DataError::TimeConversion(e.to_string()))?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }
        debug!(symbol, rows = quotes.len(), "fetched quotes");

        let dates: Vec<i64> = quotes.iter().map(|q| q.timestamp as i64).collect();
        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
        let adj_closes: Vec<f64> = quotes.iter().map(|q| q.adjclose).collect();

        let mut df = DataFrame::new(vec![
            Series::new("timestamp".into(), dates).into(),
            Series::new("close".into(), closes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let symbol_col: Column = Series::new("symbol".into(), vec![symbol; df.height()]).into();
        df.with_column(symbol_col)?;

        // Convert timestamp to date
        let df = df
            .lazy()
            .with_column(
                (col("timestamp") * lit(1_000_000_000))
                    .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                    .cast(DataType::Date)
                    .alias("date"),
            )
            .select(&[
                col("symbol"),
                col("date"),
                col("close"),
                col("adjusted_close"),
            ])
            .collect()?;

        sleep(self.rate_limit_delay).await;

        Ok(df)
    }
}
