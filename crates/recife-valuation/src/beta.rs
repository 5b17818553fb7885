//! Market Beta
//!
//! Estimates a stock's beta against the index by ordinary least squares on
//! aligned periodic returns:
//!
//! ```text
//! r_stock = alpha + beta * r_index + e
//! ```
//!
//! Returns are matched on their key (`(year, month)` for monthly data); keys
//! present in only one series are ignored.

use crate::error::{Result, ValuationError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Configuration for the beta estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaConfig {
    /// Minimum number of aligned returns required (default: 12)
    pub min_observations: usize,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            min_observations: 12,
        }
    }
}

/// Result of a beta regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaEstimate {
    /// Slope: `cov(stock, index) / var(index)`
    pub beta: f64,
    /// Intercept
    pub alpha: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Standard error of the slope
    pub std_error: f64,
    /// Number of aligned returns used
    pub observations: usize,
}

/// OLS beta estimator
#[derive(Debug, Clone, Default)]
pub struct BetaEstimator {
    config: BetaConfig,
}

impl BetaEstimator {
    /// Create an estimator with the given configuration.
    pub const fn with_config(config: BetaConfig) -> Self {
        Self { config }
    }

    /// Estimator configuration.
    pub const fn config(&self) -> &BetaConfig {
        &self.config
    }

    /// Regress stock returns on index returns.
    ///
    /// Non-finite returns are discarded before alignment.
    pub fn estimate<K: Ord>(
        &self,
        stock: &BTreeMap<K, f64>,
        index: &BTreeMap<K, f64>,
    ) -> Result<BetaEstimate> {
        let (y, x): (Vec<f64>, Vec<f64>) = stock
            .iter()
            .filter_map(|(key, &s)| index.get(key).map(|&m| (s, m)))
            .filter(|(s, m)| s.is_finite() && m.is_finite())
            .unzip();

        // The slope standard error needs two residual degrees of freedom
        let required = self.config.min_observations.max(3);
        let n = y.len();
        if n < required {
            return Err(ValuationError::InsufficientData {
                required,
                actual: n,
            });
        }

        let y = Array1::from(y);
        let x = Array1::from(x);
        let nf = n as f64;

        let x_mean = x.sum() / nf;
        let y_mean = y.sum() / nf;
        let dx = &x - x_mean;
        let dy = &y - y_mean;

        let sxx = dx.dot(&dx);
        if sxx <= f64::EPSILON * nf {
            return Err(ValuationError::Degenerate(
                "index returns have zero variance".to_string(),
            ));
        }

        let beta = dx.dot(&dy) / sxx;
        let alpha = y_mean - beta * x_mean;

        let residuals = &y - &(&x * beta) - alpha;
        let sse = residuals.dot(&residuals);
        let sst = dy.dot(&dy);
        let r_squared = if sst > 0.0 {
            (1.0 - sse / sst).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let std_error = (sse / (nf - 2.0) / sxx).sqrt();

        debug!(observations = n, beta, r_squared, "estimated beta");

        Ok(BetaEstimate {
            beta,
            alpha,
            r_squared,
            std_error,
            observations: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn months(values: &[f64]) -> BTreeMap<(i32, u32), f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| ((2020 + (i / 12) as i32, (i % 12) as u32 + 1), v))
            .collect()
    }

    fn index_returns() -> Vec<f64> {
        vec![
            0.02, -0.01, 0.03, 0.015, -0.02, 0.01, 0.005, -0.03, 0.04, 0.0, 0.012, -0.008,
            0.025, -0.015,
        ]
    }

    #[test]
    fn test_config_defaults() {
        let estimator = BetaEstimator::default();
        assert_eq!(estimator.config().min_observations, 12);
    }

    #[rstest]
    #[case(1.3, 0.002)]
    #[case(0.8, -0.001)]
    #[case(-0.5, 0.0)]
    fn test_exact_linear_relationship(#[case] beta: f64, #[case] alpha: f64) {
        let market = index_returns();
        let stock: Vec<f64> = market.iter().map(|m| alpha + beta * m).collect();

        let estimate = BetaEstimator::default()
            .estimate(&months(&stock), &months(&market))
            .unwrap();

        assert_relative_eq!(estimate.beta, beta, epsilon = 1e-10);
        assert_relative_eq!(estimate.alpha, alpha, epsilon = 1e-10);
        assert_relative_eq!(estimate.r_squared, 1.0, epsilon = 1e-10);
        assert!(estimate.std_error < 1e-6);
        assert_eq!(estimate.observations, market.len());
    }

    #[test]
    fn test_beta_matches_cov_over_var() {
        let market = index_returns();
        let noise = [
            0.004, -0.002, 0.001, -0.003, 0.002, 0.0, -0.001, 0.003, -0.004, 0.002, 0.001,
            -0.002, 0.0, 0.001,
        ];
        let stock: Vec<f64> = market
            .iter()
            .zip(noise)
            .map(|(m, e)| 1.1 * m + e)
            .collect();

        let n = market.len() as f64;
        let mx = market.iter().sum::<f64>() / n;
        let my = stock.iter().sum::<f64>() / n;
        let cov: f64 = market.iter().zip(&stock).map(|(x, y)| (x - mx) * (y - my)).sum();
        let var: f64 = market.iter().map(|x| (x - mx).powi(2)).sum();

        let estimate = BetaEstimator::default()
            .estimate(&months(&stock), &months(&market))
            .unwrap();

        assert_relative_eq!(estimate.beta, cov / var, epsilon = 1e-12);
        assert!(estimate.r_squared > 0.0 && estimate.r_squared < 1.0);
        assert!(estimate.std_error > 0.0);
    }

    #[test]
    fn test_only_aligned_months_are_used() {
        let market = months(&index_returns());
        let mut stock = market.clone();
        stock.insert((2030, 1), 5.0);
        stock.remove(&(2020, 1));

        let estimate = BetaEstimator::default().estimate(&stock, &market).unwrap();
        assert_eq!(estimate.observations, market.len() - 1);
        assert_relative_eq!(estimate.beta, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_insufficient_observations() {
        let market = months(&index_returns()[..6]);
        let result = BetaEstimator::default().estimate(&market, &market);
        assert!(matches!(
            result,
            Err(ValuationError::InsufficientData {
                required: 12,
                actual: 6
            })
        ));
    }

    #[test]
    fn test_constant_index_is_degenerate() {
        let market = months(&[0.01; 14]);
        let stock = months(&index_returns());
        let result = BetaEstimator::default().estimate(&stock, &market);
        assert!(matches!(result, Err(ValuationError::Degenerate(_))));
    }

    #[test]
    fn test_custom_min_observations() {
        let estimator = BetaEstimator::with_config(BetaConfig {
            min_observations: 4,
        });
        let market = months(&index_returns()[..5]);
        assert!(estimator.estimate(&market, &market).is_ok());
    }
}
