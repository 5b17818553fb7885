//! CAPM cost of equity and value spread.
//!
//! `Ke = Rf + beta * (Rm - Rf)`, where the risk-free rate is the compounded
//! annual SELIC and the market return is the annual IBOV return. The value
//! spread `ROE - Ke` is the excess return per unit of opening equity.

use crate::roe::RoeObservation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Market inputs of one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketParameters {
    /// Calendar year
    pub year: i32,
    /// Risk-free rate (Rf)
    pub risk_free: f64,
    /// Market return (Rm)
    pub market_return: f64,
}

impl MarketParameters {
    /// Inner join of annual risk-free rates and market returns.
    pub fn join(risk_free: &BTreeMap<i32, f64>, market_return: &BTreeMap<i32, f64>) -> Vec<Self> {
        risk_free
            .iter()
            .filter_map(|(&year, &rf)| {
                market_return.get(&year).map(|&rm| Self {
                    year,
                    risk_free: rf,
                    market_return: rm,
                })
            })
            .collect()
    }

    /// `Rm - Rf`
    pub const fn equity_risk_premium(&self) -> f64 {
        self.market_return - self.risk_free
    }
}

/// CAPM cost of equity: `rf + beta * (rm - rf)`.
pub const fn cost_of_equity(risk_free: f64, market_return: f64, beta: f64) -> f64 {
    risk_free + beta * (market_return - risk_free)
}

/// Value spread: `roe - ke`.
pub const fn value_spread(roe: f64, cost_of_equity: f64) -> f64 {
    roe - cost_of_equity
}

/// Derived metrics of one bank-year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationRow {
    /// Fiscal year
    pub year: i32,
    /// Net income attributable to the controlling shareholders, BRL
    pub net_income: f64,
    /// Controlling shareholders' equity at year end, BRL
    pub equity: f64,
    /// Controlling shareholders' equity at the previous year end, BRL
    pub opening_equity: f64,
    /// Return on opening equity
    pub roe: f64,
    /// Equity beta against the index
    pub beta: f64,
    /// Risk-free rate
    pub rf: f64,
    /// Market return
    pub rm: f64,
    /// `rm - rf`
    pub equity_risk_premium: f64,
    /// Cost of equity
    pub ke: f64,
    /// `roe - ke`
    pub spread: f64,
    /// `spread * opening_equity`, BRL
    pub excess_return: f64,
}

/// Price every ROE observation that has market parameters for its year.
pub fn build_valuation(
    observations: &[RoeObservation],
    market: &[MarketParameters],
    beta: f64,
) -> Vec<ValuationRow> {
    let market: BTreeMap<i32, &MarketParameters> = market.iter().map(|m| (m.year, m)).collect();

    observations
        .iter()
        .filter_map(|obs| {
            let Some(params) = market.get(&obs.year) else {
                debug!(year = obs.year, "no market parameters");
                return None;
            };
            let ke = cost_of_equity(params.risk_free, params.market_return, beta);
            let spread = value_spread(obs.roe, ke);
            Some(ValuationRow {
                year: obs.year,
                net_income: obs.net_income,
                equity: obs.equity,
                opening_equity: obs.opening_equity,
                roe: obs.roe,
                beta,
                rf: params.risk_free,
                rm: params.market_return,
                equity_risk_premium: params.equity_risk_premium(),
                ke,
                spread,
                excess_return: spread * obs.opening_equity,
            })
        })
        .collect()
}
