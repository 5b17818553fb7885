//! Market inputs: annual SELIC, price series and betas.

use super::cache_manager::SharedCache;
use super::pipeline::{FetchConfig, PipelineError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use recife_data::bcb::{BcbClient, annualize_daily_rates};
use recife_data::error::DataError;
use recife_data::yahoo::{PriceSeries, YahooQuoteProvider};
use recife_valuation::{BetaConfig, BetaEstimate, BetaEstimator, ValuationError};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// First and last calendar day of a range of years.
pub(crate) fn calendar_bounds(
    years: &RangeInclusive<i32>,
) -> Result<(NaiveDate, NaiveDate), DataError> {
    let start = NaiveDate::from_ymd_opt(*years.start(), 1, 1);
    let end = NaiveDate::from_ymd_opt(*years.end(), 12, 31);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => Ok((start, end)),
        _ => Err(DataError::InvalidDateRange {
            start: years.start().to_string(),
            end: years.end().to_string(),
        }),
    }
}

fn to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Compounded annual rate of a daily SGS series, from the cache when it
/// covers every year.
pub(crate) async fn annual_rates(
    client: &BcbClient,
    cache: &SharedCache,
    series: u32,
    years: &RangeInclusive<i32>,
    config: &FetchConfig,
) -> Result<BTreeMap<i32, f64>, PipelineError> {
    let (start, end) = (*years.start(), *years.end());

    {
        let guard = cache.lock().await;
        if let Some(ref cache) = *guard
            && !config.force_refresh
            && cache.has_daily_rates(series, start, end).unwrap_or(false)
        {
            let rates = cache.get_daily_rates(series, start, end)?;
            debug!(series, observations = rates.len(), "daily rates from cache");
            return Ok(annualize_daily_rates(&rates));
        }
    }

    let rates = client.fetch_series(series, start, end).await?;

    let guard = cache.lock().await;
    if let Some(ref cache) = *guard
        && let Err(e) = cache.put_daily_rates(series, &rates)
    {
        warn!(series, error = %e, "failed to cache daily rates");
    }

    Ok(annualize_daily_rates(&rates))
}

/// Adjusted closes of a symbol over whole calendar years, with caching.
pub(crate) async fn price_series(
    provider: &YahooQuoteProvider,
    cache: &SharedCache,
    symbol: &str,
    years: &RangeInclusive<i32>,
    config: &FetchConfig,
) -> Result<PriceSeries, PipelineError> {
    let (start, end) = calendar_bounds(years)?;

    {
        let guard = cache.lock().await;
        if let Some(ref cache) = *guard
            && !config.force_refresh
            && cache.has_quotes(symbol, start, end).unwrap_or(false)
            && let Ok(df) = cache.get_quotes(symbol, start, end)
        {
            debug!(symbol, rows = df.height(), "quotes from cache");
            return Ok(PriceSeries::from_quotes(&df)?);
        }
    }

    let df = provider.fetch_quotes(symbol, to_utc(start), to_utc(end)).await?;

    let guard = cache.lock().await;
    if let Some(ref cache) = *guard
        && let Err(e) = cache.put_quotes(&df)
    {
        warn!(symbol, error = %e, "failed to cache quotes");
    }
    drop(guard);

    let series = PriceSeries::from_quotes(&df)?;
    info!(symbol, prices = series.len(), "fetched prices");
    Ok(series)
}

/// OLS beta of a stock against an index on month-end returns.
pub(crate) fn estimate_beta(
    stock: &PriceSeries,
    index: &PriceSeries,
    config: BetaConfig,
) -> Result<BetaEstimate, ValuationError> {
    BetaEstimator::with_config(config).estimate(&stock.monthly_returns(), &index.monthly_returns())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn monthly(symbol: &str, start: f64, growth: impl Fn(u32) -> f64) -> PriceSeries {
        let mut price = start;
        let points = (0..24u32)
            .map(|i| {
                let year = 2022 + (i / 12) as i32;
                let month = i % 12 + 1;
                price *= 1.0 + growth(i);
                (NaiveDate::from_ymd_opt(year, month, 28).unwrap(), price)
            })
            .collect();
        PriceSeries::new(symbol, points)
    }

    #[test]
    fn test_calendar_bounds() {
        let (start, end) = calendar_bounds(&(2010..=2024)).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(to_utc(start).to_rfc3339(), "2010-01-01T00:00:00+00:00");
    }

    #[rstest]
    #[case(2024..=2010)]
    #[case(i32::MAX..=i32::MAX)]
    fn test_calendar_bounds_rejects_invalid_ranges(#[case] years: RangeInclusive<i32>) {
        assert!(matches!(
            calendar_bounds(&years),
            Err(DataError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_estimate_beta_from_prices() {
        let index_growth = |i: u32| if i % 3 == 0 { 0.04 } else { -0.01 * f64::from(i % 5) };
        let index = monthly("^BVSP", 100_000.0, index_growth);
        let stock = monthly("ITUB4.SA", 25.0, |i| 0.002 + 1.5 * index_growth(i));

        let estimate = estimate_beta(&stock, &index, BetaConfig::default()).unwrap();
        assert_eq!(estimate.observations, 23);
        assert_relative_eq!(estimate.beta, 1.5, epsilon = 1e-9);
        assert_relative_eq!(estimate.alpha, 0.002, epsilon = 1e-9);
    }

    #[test]
    fn test_estimate_beta_needs_history() {
        let index = monthly("^BVSP", 100.0, |i| 0.01 * f64::from(i % 4));
        let stock = monthly("BBAS3.SA", 10.0, |i| 0.02 * f64::from(i % 3));

        let config = BetaConfig {
            min_observations: 36,
        };
        assert!(matches!(
            estimate_beta(&stock, &index, config),
            Err(ValuationError::InsufficientData { .. })
        ));
    }

    #[tokio::test]
    async fn test_annual_rates_from_cache() {
        use recife_data::bcb::DailyRate;
        use recife_data::cache::SqliteCache;
        use std::sync::Arc;

        let cache = SqliteCache::in_memory().unwrap();
        let rates: Vec<DailyRate> = [(2022, 0.05), (2023, 0.04)]
            .iter()
            .flat_map(|&(year, rate_pct)| {
                // First and last sessions of each year
                [(1, 2..=6), (12, 22..=26)]
                    .into_iter()
                    .flat_map(move |(month, days)| {
                        days.map(move |day| DailyRate {
                            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
                            rate_pct,
                        })
                    })
            })
            .collect();
        cache.put_daily_rates(11, &rates).unwrap();
        let shared: SharedCache = Arc::new(tokio::sync::Mutex::new(Some(cache)));

        // Never contacted: the cache covers both years
        let client = BcbClient::new().unwrap();
        let annual = annual_rates(&client, &shared, 11, &(2022..=2023), &FetchConfig::default())
            .await
            .unwrap();

        assert_relative_eq!(annual[&2022], 1.0005_f64.powi(10) - 1.0, epsilon = 1e-12);
        assert_relative_eq!(annual[&2023], 1.0004_f64.powi(10) - 1.0, epsilon = 1e-12);
    }
}
