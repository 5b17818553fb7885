//! SELIC rate retrieval and annual compounding.

use crate::error::{DataError, Result};
use crate::rate_limit::RateLimiter;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// BCB SGS API base URL
const BCB_SGS_BASE_URL: &str = "https://api.bcb.gov.br/dados/serie";

/// Daily SELIC (Over) rate, percent per day.
pub const SELIC_DAILY_SERIES: u32 = 11;

/// The SGS API rejects daily-series windows longer than ten years.
pub const MAX_YEARS_PER_REQUEST: i32 = 10;

const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(200);

/// Raw SGS observation: `{"data": "04/01/2010", "valor": "0.033000"}`
#[derive(Debug, Deserialize)]
struct SgsObservation {
    data: String,
    valor: String,
}

/// One daily observation of a rate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRate {
    /// Observation date
    pub date: NaiveDate,
    /// Rate in percent per day
    pub rate_pct: f64,
}

/// Split `[start_year, end_year]` into request windows the API accepts.
pub fn year_blocks(start_year: i32, end_year: i32) -> Vec<(i32, i32)> {
    (start_year..=end_year)
        .step_by(MAX_YEARS_PER_REQUEST as usize)
        .map(|block_start| {
            (
                block_start,
                (block_start + MAX_YEARS_PER_REQUEST - 1).min(end_year),
            )
        })
        .collect()
}

/// Parse an SGS JSON payload.
pub fn parse_sgs_response(body: &str) -> Result<Vec<DailyRate>> {
    let observations: Vec<SgsObservation> = serde_json::from_str(body).map_err(|e| {
        DataError::BcbApi(format!(
            "unexpected SGS payload ({}): {}",
            e,
            body.chars().take(120).collect::<String>()
        ))
    })?;

    observations
        .into_iter()
        .map(|obs| {
            let date = NaiveDate::parse_from_str(obs.data.trim(), "%d/%m/%Y")
                .map_err(|e| DataError::Parse(format!("SGS date '{}': {}", obs.data, e)))?;
            let rate_pct = obs
                .valor
                .trim()
                .parse::<f64>()
                .map_err(|e| DataError::Parse(format!("SGS value '{}': {}", obs.valor, e)))?;
            Ok(DailyRate { date, rate_pct })
        })
        .collect()
}

/// Compound daily rates into calendar-year rates: `prod(1 + r/100) - 1`.
pub fn annualize_daily_rates(rates: &[DailyRate]) -> BTreeMap<i32, f64> {
    let mut factors: BTreeMap<i32, f64> = BTreeMap::new();
    for rate in rates {
        *factors.entry(rate.date.year()).or_insert(1.0) *= 1.0 + rate.rate_pct / 100.0;
    }
    factors
        .into_iter()
        .map(|(year, factor)| (year, factor - 1.0))
        .collect()
}

/// BCB SGS API client with rate limiting.
pub struct BcbClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
}

impl BcbClient {
    /// Create a new client with default settings.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            base_url: BCB_SGS_BASE_URL.to_string(),
        })
    }

    /// URL for one request window of a series.
    pub fn series_url(&self, series: u32, start_year: i32, end_year: i32) -> String {
        format!(
            "{}/bcdata.sgs.{}/dados?formato=json&dataInicial=01/01/{}&dataFinal=31/12/{}",
            self.base_url, series, start_year, end_year
        )
    }

    /// Fetch all observations of a series between two calendar years, inclusive.
    pub async fn fetch_series(
        &self,
        series: u32,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DailyRate>> {
        if start_year > end_year {
            return Err(DataError::InvalidDateRange {
                start: start_year.to_string(),
                end: end_year.to_string(),
            });
        }

        let mut rates = Vec::new();
        for (block_start, block_end) in year_blocks(start_year, end_year) {
            self.rate_limiter.lock().await.wait().await;

            let url = self.series_url(series, block_start, block_end);
            debug!(%url, "requesting SGS window");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(DataError::Network)?;

            if !response.status().is_success() {
                return Err(DataError::BcbApi(format!(
                    "series {} {}-{}: HTTP {}",
                    series,
                    block_start,
                    block_end,
                    response.status()
                )));
            }

            let body = response.text().await.map_err(DataError::Network)?;
            rates.extend(parse_sgs_response(&body)?);
        }

        if rates.is_empty() {
            return Err(DataError::MissingData {
                symbol: format!("SGS {}", series),
                reason: format!("no observations between {} and {}", start_year, end_year),
            });
        }

        info!(series, observations = rates.len(), "fetched SGS series");
        Ok(rates)
    }

    /// Fetch daily SELIC rates.
    pub async fn fetch_selic(&self, start_year: i32, end_year: i32) -> Result<Vec<DailyRate>> {
        self.fetch_series(SELIC_DAILY_SERIES, start_year, end_year)
            .await
    }
}

impl std::fmt::Debug for BcbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BcbClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(2010, 2024, vec![(2010, 2019), (2020, 2024)])]
    #[case(2010, 2019, vec![(2010, 2019)])]
    #[case(2015, 2015, vec![(2015, 2015)])]
    #[case(2000, 2020, vec![(2000, 2009), (2010, 2019), (2020, 2020)])]
    fn test_year_blocks(#[case] start: i32, #[case] end: i32, #[case] expected: Vec<(i32, i32)>) {
        assert_eq!(year_blocks(start, end), expected);
    }

    #[test]
    fn test_year_blocks_empty_range() {
        assert!(year_blocks(2020, 2019).is_empty());
    }

    #[test]
    fn test_parse_sgs_response() {
        let body = r#"[{"data":"04/01/2010","valor":"0.032927"},{"data":"05/01/2010","valor":"0.032927"}]"#;
        let rates = parse_sgs_response(body).unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].date, NaiveDate::from_ymd_opt(2010, 1, 4).unwrap());
        assert_relative_eq!(rates[1].rate_pct, 0.032927);
    }

    #[test]
    fn test_parse_sgs_error_payload() {
        let body = r#"{"error":"O sistema aceita uma janela de consulta de, no máximo, 10 anos"}"#;
        assert!(matches!(
            parse_sgs_response(body),
            Err(DataError::BcbApi(_))
        ));
    }

    #[test]
    fn test_annualize_daily_rates() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let rates = vec![
            DailyRate { date: d(2020, 1, 2), rate_pct: 1.0 },
            DailyRate { date: d(2020, 1, 3), rate_pct: 1.0 },
            DailyRate { date: d(2021, 6, 1), rate_pct: 0.5 },
        ];
        let annual = annualize_daily_rates(&rates);

        assert_relative_eq!(annual[&2020], 1.01 * 1.01 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(annual[&2021], 0.005, epsilon = 1e-12);
    }

    #[test]
    fn test_annualize_full_year_of_constant_rate() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let rates: Vec<DailyRate> = (0..252)
            .map(|i| DailyRate {
                date: start + chrono::Duration::days(i),
                rate_pct: 0.0465,
            })
            .filter(|r| r.date.year() == 2023)
            .collect();
        let annual = annualize_daily_rates(&rates);

        let expected = (1.0f64 + 0.000465).powi(252) - 1.0;
        assert_relative_eq!(annual[&2023], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_series_url() {
        let client = BcbClient::new().unwrap();
        assert_eq!(
            client.series_url(11, 2010, 2019),
            "https://api.bcb.gov.br/dados/serie/bcdata.sgs.11/dados?formato=json&dataInicial=01/01/2010&dataFinal=31/12/2019"
        );
    }
}
