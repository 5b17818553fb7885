//! Return on Equity
//!
//! ROE is measured on opening equity: the year's net income divided by the
//! controlling shareholders' equity at the end of the previous fiscal year.
//! A year is only priced when the immediately preceding year is known, so
//! gaps in the filings never stretch the denominator across several years.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Accounting figures of one fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    /// Fiscal year
    pub year: i32,
    /// Net income attributable to the controlling shareholders
    pub net_income: f64,
    /// Controlling shareholders' equity at year end
    pub controlling_equity: f64,
}

impl FinancialPeriod {
    /// Inner join of yearly net income and equity.
    pub fn join(net_income: &BTreeMap<i32, f64>, equity: &BTreeMap<i32, f64>) -> Vec<Self> {
        net_income
            .iter()
            .filter_map(|(&year, &net_income)| {
                equity.get(&year).map(|&controlling_equity| Self {
                    year,
                    net_income,
                    controlling_equity,
                })
            })
            .collect()
    }
}

/// ROE of one fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoeObservation {
    /// Fiscal year
    pub year: i32,
    /// Net income of the year
    pub net_income: f64,
    /// Equity at the end of the year
    pub equity: f64,
    /// Equity at the end of the previous year
    pub opening_equity: f64,
    /// `net_income / opening_equity`
    pub roe: f64,
}

/// Compute ROE on opening equity.
///
/// Periods may arrive in any order. The first year, years whose previous
/// year is missing and years with non-positive opening equity produce no
/// observation.
pub fn compute_roe(periods: &[FinancialPeriod]) -> Vec<RoeObservation> {
    let by_year: BTreeMap<i32, &FinancialPeriod> = periods.iter().map(|p| (p.year, p)).collect();

    by_year
        .values()
        .filter_map(|period| {
            let Some(previous) = by_year.get(&(period.year - 1)) else {
                debug!(year = period.year, "no opening equity");
                return None;
            };
            let opening_equity = previous.controlling_equity;
            if opening_equity.is_nan() || opening_equity <= 0.0 {
                debug!(year = period.year, opening_equity, "non-positive opening equity");
                return None;
            }
            Some(RoeObservation {
                year: period.year,
                net_income: period.net_income,
                equity: period.controlling_equity,
                opening_equity,
                roe: period.net_income / opening_equity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn period(year: i32, net_income: f64, controlling_equity: f64) -> FinancialPeriod {
        FinancialPeriod {
            year,
            net_income,
            controlling_equity,
        }
    }

    #[test]
    fn test_join_keeps_common_years() {
        let income = BTreeMap::from([(2020, 10.0), (2021, 12.0), (2022, 14.0)]);
        let equity = BTreeMap::from([(2021, 100.0), (2022, 110.0), (2023, 120.0)]);

        let periods = FinancialPeriod::join(&income, &equity);
        assert_eq!(periods, vec![period(2021, 12.0, 100.0), period(2022, 14.0, 110.0)]);
    }

    #[test]
    fn test_roe_uses_opening_equity() {
        let periods = vec![
            period(2022, 30.0, 200.0),
            period(2021, 25.0, 180.0),
            period(2023, 35.0, 220.0),
        ];
        let obs = compute_roe(&periods);

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].year, 2022);
        assert_relative_eq!(obs[0].opening_equity, 180.0);
        assert_relative_eq!(obs[0].roe, 30.0 / 180.0);
        assert_relative_eq!(obs[1].roe, 35.0 / 200.0);
        assert_relative_eq!(obs[1].equity, 220.0);
    }

    #[test]
    fn test_roe_does_not_bridge_gaps() {
        let periods = vec![
            period(2018, 10.0, 100.0),
            period(2020, 12.0, 120.0),
            period(2021, 13.0, 130.0),
        ];
        let obs = compute_roe(&periods);

        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].year, 2021);
    }

    #[test]
    fn test_roe_drops_non_positive_opening_equity() {
        let periods = vec![
            period(2019, 1.0, -5.0),
            period(2020, 2.0, 0.0),
            period(2021, 3.0, 10.0),
        ];
        assert!(compute_roe(&periods).is_empty());
    }

    #[test]
    fn test_roe_single_year_is_empty() {
        assert!(compute_roe(&[period(2020, 1.0, 10.0)]).is_empty());
        assert!(compute_roe(&[]).is_empty());
    }
}
