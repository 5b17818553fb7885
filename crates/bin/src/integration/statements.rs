//! CVM statement ingestion.
//!
//! Downloads the yearly DFP archives the cache does not already hold, keeps
//! the lines of the tracked banks and turns them into fiscal periods.

use super::cache_manager::SharedCache;
use super::pipeline::{FetchConfig, PipelineError, above_progress};
use futures::StreamExt;
use indicatif::ProgressBar;
use recife::Bank;
use recife_data::cache::SqliteCache;
use recife_data::cvm::{
    CvmClient, DfpArchive, DfpRecord, StatementKind, extract_controlling_equity,
    extract_net_income, normalize_cnpj,
};
use recife_data::error::DataError;
use recife_valuation::FinancialPeriod;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// DRE and BPP lines of one or more companies.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StatementLines {
    pub(crate) income: Vec<DfpRecord>,
    pub(crate) balance_sheet: Vec<DfpRecord>,
}

impl StatementLines {
    /// Read the consolidated statements of an archive, keeping only `cnpjs`
    /// (normalized).
    pub(crate) fn from_archive(
        mut archive: DfpArchive,
        cnpjs: &BTreeSet<String>,
    ) -> Result<Self, DataError> {
        let tracked = |cnpj: &str| cnpjs.contains(&normalize_cnpj(cnpj));
        let lines = Self {
            income: archive.statement_for(StatementKind::Income, tracked)?,
            balance_sheet: archive.statement_for(StatementKind::BalanceSheetLiabilities, tracked)?,
        };
        debug!(
            year = archive.year(),
            income = lines.income.len(),
            balance_sheet = lines.balance_sheet.len(),
            "read DFP statements"
        );
        Ok(lines)
    }

    /// Cached lines of one company.
    pub(crate) fn load(cache: &SqliteCache, cnpj: &str) -> Result<Self, DataError> {
        Ok(Self {
            income: cache.get_dfp_lines(cnpj, StatementKind::Income)?,
            balance_sheet: cache.get_dfp_lines(cnpj, StatementKind::BalanceSheetLiabilities)?,
        })
    }

    /// Cache the lines of one company for one archive year.
    ///
    /// The year is marked as ingested for the company only when the archive
    /// holds both its income statement and its balance sheet, so late filers
    /// are looked up again on the next run. Returns whether it was marked.
    pub(crate) fn store(&self, cache: &SqliteCache, year: i32, cnpj: &str) -> Result<bool, DataError> {
        let income = cache.put_dfp_lines(cnpj, &self.income)?;
        let balance_sheet = cache.put_dfp_lines(cnpj, &self.balance_sheet)?;
        if income == 0 || balance_sheet == 0 {
            return Ok(false);
        }
        cache.mark_dfp_ingested(year, cnpj)?;
        Ok(true)
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&DfpRecord) -> bool) {
        self.income.retain(|r| keep(r));
        self.balance_sheet.retain(|r| keep(r));
    }

    pub(crate) fn extend(&mut self, other: Self) {
        self.income.extend(other.income);
        self.balance_sheet.extend(other.balance_sheet);
    }

    /// Copy of the lines of one company.
    pub(crate) fn company(&self, cnpj: &str) -> Self {
        let target = normalize_cnpj(cnpj);
        let mut lines = self.clone();
        lines.retain(|r| normalize_cnpj(&r.cnpj) == target);
        lines
    }

    pub(crate) fn len(&self) -> usize {
        self.income.len() + self.balance_sheet.len()
    }

    /// Net income and controlling equity of a company for the years in range.
    pub(crate) fn periods(&self, cnpj: &str, years: &RangeInclusive<i32>) -> Vec<FinancialPeriod> {
        let income = extract_net_income(&self.income, cnpj);
        let equity = extract_controlling_equity(&self.balance_sheet, cnpj);
        FinancialPeriod::join(&income, &equity)
            .into_iter()
            .filter(|p| years.contains(&p.year))
            .collect()
    }
}

/// Years whose archive still has to be downloaded.
///
/// A year is skipped only when every bank has been ingested from it.
pub(crate) fn years_to_fetch(
    cache: Option<&SqliteCache>,
    banks: &[Bank],
    years: &RangeInclusive<i32>,
    force_refresh: bool,
) -> Vec<i32> {
    match cache {
        Some(cache) if !force_refresh => years
            .clone()
            .filter(|&year| {
                !banks
                    .iter()
                    .all(|bank| cache.is_dfp_ingested(year, &bank.cnpj).unwrap_or(false))
            })
            .collect(),
        _ => years.clone().collect(),
    }
}

/// Fiscal periods of every bank, keyed by the bank's CNPJ.
///
/// Years the portal does not serve are skipped with a warning. Fails when
/// no year at all is available, from the cache or the portal.
pub(crate) async fn ingest_statements(
    client: &CvmClient,
    cache: &SharedCache,
    banks: &[Bank],
    years: RangeInclusive<i32>,
    config: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<BTreeMap<String, Vec<FinancialPeriod>>, PipelineError> {
    let total = years.clone().count();
    let pending = {
        let guard = cache.lock().await;
        years_to_fetch(guard.as_ref(), banks, &years, config.force_refresh)
    };
    let pending_set: BTreeSet<i32> = pending.iter().copied().collect();
    let mut obtained = total - pending.len();
    above_progress(progress, || {
        info!(cached = obtained, pending = pending.len(), "DFP fiscal years");
    });

    if let Some(pb) = progress {
        pb.set_length(total as u64);
        pb.set_position(obtained as u64);
        if pending.is_empty() {
            pb.set_message("Loading statements from cache...");
        } else {
            pb.set_message(format!("Downloading {} DFP archives...", pending.len()));
        }
    }

    let cnpjs: Arc<BTreeSet<String>> =
        Arc::new(banks.iter().map(|b| normalize_cnpj(&b.cnpj)).collect());
    let mut fetched = StatementLines::default();

    let mut archives = std::pin::pin!(client.dfp_archive_stream(pending));
    while let Some((year, result)) = archives.next().await {
        let lines = match result {
            Ok(archive) => {
                let cnpjs = Arc::clone(&cnpjs);
                tokio::task::spawn_blocking(move || StatementLines::from_archive(archive, &cnpjs))
                    .await?
            }
            Err(e) => Err(e),
        };

        match lines {
            Ok(lines) => {
                obtained += 1;
                let guard = cache.lock().await;
                if let Some(ref cache) = *guard {
                    for bank in banks {
                        match lines.store(cache, year, &bank.cnpj) {
                            Ok(true) => {}
                            Ok(false) => {
                                debug!(year, bank = %bank.name, "statements not in archive yet");
                            }
                            Err(e) => above_progress(progress, || {
                                warn!(year, bank = %bank.name, error = %e, "failed to cache statements");
                            }),
                        }
                    }
                }
                drop(guard);
                fetched.extend(lines);
            }
            Err(e) => above_progress(progress, || {
                warn!(year, error = %e, "DFP year unavailable, skipping");
            }),
        }

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    if obtained == 0 {
        return Err(DataError::MissingData {
            symbol: "DFP".to_string(),
            reason: format!(
                "no fiscal year obtained between {} and {}",
                years.start(),
                years.end()
            ),
        }
        .into());
    }

    let guard = cache.lock().await;
    let mut periods = BTreeMap::new();
    for bank in banks {
        let mut lines = fetched.company(&bank.cnpj);
        if let Some(ref cache) = *guard {
            let mut cached = StatementLines::load(cache, &bank.cnpj)?;
            cached.retain(|r| !pending_set.contains(&r.year()));
            lines.extend(cached);
        }

        debug!(bank = %bank.name, lines = lines.len(), "statement lines");
        periods.insert(bank.cnpj.clone(), lines.periods(&bank.cnpj, &years));
    }

    Ok(periods)
}
