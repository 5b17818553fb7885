#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod beta;
pub mod capm;
pub mod error;
pub mod roe;
pub mod summary;

pub use beta::{BetaConfig, BetaEstimate, BetaEstimator};
pub use capm::{MarketParameters, ValuationRow, build_valuation, cost_of_equity, value_spread};
pub use error::{Result, ValuationError};
pub use roe::{FinancialPeriod, RoeObservation, compute_roe};
pub use summary::{BankSummary, summarize};
