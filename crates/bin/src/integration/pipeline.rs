//! End-to-end excess return pipeline.
//!
//! Statements, SELIC and index prices are gathered once; each bank is then
//! priced with its own beta. Banks lacking data are skipped with a warning.

use super::cache_manager::{SharedCache, shared_cache};
use super::market::{annual_rates, estimate_beta, price_series};
use super::statements::ingest_statements;
use indicatif::ProgressBar;
use recife::{AppConfig, Bank, ConfigError};
use recife_data::bcb::BcbClient;
use recife_data::cvm::CvmClient;
use recife_data::error::DataError;
use recife_data::yahoo::{PriceSeries, YahooQuoteProvider};
use recife_output::{
    BankValuation, ExportError, Report, ReportBuilder, ReportError, write_report_bundle,
};
use recife_valuation::{
    BetaEstimate, FinancialPeriod, MarketParameters, ValuationError, build_valuation, compute_roe,
};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing::{info, warn};

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PipelineError {
    /// Download, parsing or cache failure.
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// Estimation failure.
    #[error("Valuation error: {0}")]
    Valuation(#[from] ValuationError),
    /// Output file failure.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    /// Report assembly failure.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Every bank was skipped.
    #[error("No bank processed successfully")]
    NoBankProcessed,
}

/// Configuration for data fetching.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub use_cache: bool,
    /// Whether to force refresh (ignore cached values but rewrite them).
    pub force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

/// Run a logging closure without tearing the progress bar, if one is drawn.
pub(crate) fn above_progress(progress: Option<&ProgressBar>, log: impl FnOnce()) {
    match progress {
        Some(pb) => pb.suspend(log),
        None => log(),
    }
}

fn study_years(config: &AppConfig) -> RangeInclusive<i32> {
    config.period.start_year..=config.period.end_year
}

/// Run the full study and assemble the report.
///
/// The progress bar tracks the DFP archives and is finished once the
/// statements are ready.
pub(crate) async fn run_pipeline(
    config: &AppConfig,
    fetch: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<Report, PipelineError> {
    config.validate()?;
    let years = study_years(config);
    let universe = config.universe();
    let cache = shared_cache(fetch.use_cache);

    above_progress(progress, || {
        info!(
            start_year = years.start(),
            end_year = years.end(),
            banks = universe.len(),
            "starting excess return study"
        );
    });

    let cvm = CvmClient::new()?;
    let statements = ingest_statements(
        &cvm,
        &cache,
        universe.banks(),
        years.clone(),
        fetch,
        progress,
    )
    .await?;
    if let Some(pb) = progress {
        pb.finish_with_message("Statements ready");
    }

    let yahoo = YahooQuoteProvider::new()?;
    let (market, index) = market_inputs(config, fetch, &cache, &yahoo).await?;

    let mut valuations = Vec::with_capacity(universe.len());
    for bank in universe.banks() {
        let periods = statements.get(&bank.cnpj).map_or(&[][..], Vec::as_slice);
        match value_bank(bank, periods, &index, &market, config, fetch, &yahoo, &cache).await {
            Ok(Some(valuation)) => valuations.push(valuation),
            Ok(None) => {}
            Err(e) => warn!(bank = %bank.name, error = %e, "valuation failed, skipping bank"),
        }
    }

    if valuations.is_empty() {
        return Err(PipelineError::NoBankProcessed);
    }

    Ok(ReportBuilder::new()
        .period(*years.start(), *years.end())
        .valuations(valuations)
        .build()?)
}

#[allow(clippy::too_many_arguments)]
async fn value_bank(
    bank: &Bank,
    periods: &[FinancialPeriod],
    index: &PriceSeries,
    market: &[MarketParameters],
    config: &AppConfig,
    fetch: &FetchConfig,
    yahoo: &YahooQuoteProvider,
    cache: &SharedCache,
) -> Result<Option<BankValuation>, PipelineError> {
    let observations = compute_roe(periods);
    if observations.is_empty() {
        warn!(bank = %bank.name, periods = periods.len(), "insufficient statement data, skipping bank");
        return Ok(None);
    }

    let prices = price_series(yahoo, cache, &bank.ticker, &study_years(config), fetch).await?;
    let beta = estimate_beta(&prices, index, config.beta_config())?;
    info!(
        bank = %bank.name,
        beta = beta.beta,
        r_squared = beta.r_squared,
        observations = beta.observations,
        "estimated beta"
    );

    let rows = build_valuation(&observations, market, beta.beta);
    if rows.is_empty() {
        warn!(bank = %bank.name, "no year with market parameters, skipping bank");
        return Ok(None);
    }

    Ok(Some(BankValuation::new(
        bank.name.clone(),
        bank.ticker.clone(),
        rows,
    )))
}

/// Annual market parameters and the index price series they came from.
async fn market_inputs(
    config: &AppConfig,
    fetch: &FetchConfig,
    cache: &SharedCache,
    yahoo: &YahooQuoteProvider,
) -> Result<(Vec<MarketParameters>, PriceSeries), PipelineError> {
    let years = study_years(config);
    let bcb = BcbClient::new()?;
    let selic = annual_rates(&bcb, cache, config.market.selic_series, &years, fetch).await?;
    let index = price_series(yahoo, cache, &config.market.index_ticker, &years, fetch).await?;

    let market = MarketParameters::join(&selic, &index.annual_returns());
    info!(years = market.len(), "market parameters");
    Ok((market, index))
}

/// Write the report bundle to the configured output directory.
pub(crate) fn write_outputs(config: &AppConfig, report: &Report) -> Result<Vec<PathBuf>, PipelineError> {
    Ok(write_report_bundle(&config.output.dir, report)?)
}

/// Annual risk-free rate and index return over the study period.
pub(crate) async fn market_parameters(
    config: &AppConfig,
    fetch: &FetchConfig,
) -> Result<Vec<MarketParameters>, PipelineError> {
    config.validate()?;
    let cache = shared_cache(fetch.use_cache);
    let yahoo = YahooQuoteProvider::new()?;
    let (market, _) = market_inputs(config, fetch, &cache, &yahoo).await?;
    Ok(market)
}

/// Beta of one symbol against the configured index.
pub(crate) async fn beta_for(
    config: &AppConfig,
    fetch: &FetchConfig,
    symbol: &str,
) -> Result<BetaEstimate, PipelineError> {
    config.validate()?;
    let years = study_years(config);
    let cache = shared_cache(fetch.use_cache);
    let yahoo = YahooQuoteProvider::new()?;

    let index = price_series(&yahoo, &cache, &config.market.index_ticker, &years, fetch).await?;
    let stock = price_series(&yahoo, &cache, symbol, &years, fetch).await?;
    Ok(estimate_beta(&stock, &index, config.beta_config())?)
}
