//! Writes the full set of report files into a directory.

use crate::chart::{CHARTED, pivot_chart, roe_vs_ke_chart, spread_chart};
use crate::export::{ExportError, ExportFormat, Exporter};
use crate::pivot::PivotMetric;
use crate::report::Report;
use crate::summary::slugify;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Consolidated table of every bank-year.
pub const CONSOLIDATED_FILE: &str = "valuation_bancos.csv";

/// Per-bank aggregates.
pub const SUMMARY_CSV_FILE: &str = "resumo_bancos.csv";

/// JSON report.
pub const REPORT_FILE: &str = "valuation_bancos.json";

/// Markdown summary.
pub const SUMMARY_FILE: &str = "summary.md";

/// File stem of every bank, in report order.
///
/// Fails when a name has no usable characters or clashes with another bank
/// or with a fixed file of the bundle.
fn bank_stems(report: &Report) -> Result<Vec<String>, ExportError> {
    let mut taken: BTreeSet<String> = PivotMetric::BUNDLED
        .iter()
        .map(|m| m.file_stem().to_string())
        .chain(
            [CONSOLIDATED_FILE, SUMMARY_CSV_FILE, REPORT_FILE, SUMMARY_FILE]
                .iter()
                .filter_map(|f| Path::new(f).file_stem())
                .map(|s| s.to_string_lossy().into_owned()),
        )
        .collect();

    report
        .valuations
        .iter()
        .map(|valuation| {
            let stem = slugify(&valuation.bank);
            if stem.is_empty() || !taken.insert(stem.clone()) {
                return Err(ExportError::FileName(valuation.bank.clone()));
            }
            Ok(stem)
        })
        .collect()
}

/// Write the report bundle into `dir`, creating it if needed.
///
/// Returns the paths written, in writing order:
/// the consolidated CSV, one pivot CSV per bundled metric, one CSV per bank,
/// the summary CSV, the JSON report, the Markdown summary and, when any year
/// was priced, the SVG charts (comparative ones first, then two per bank).
pub fn write_report_bundle(dir: &Path, report: &Report) -> Result<Vec<PathBuf>, ExportError> {
    let stems = bank_stems(report)?;
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let consolidated: Vec<_> = report
        .valuations
        .iter()
        .flat_map(|v| v.consolidated_rows())
        .collect();
    let path = dir.join(CONSOLIDATED_FILE);
    consolidated.export_to_file(&path, ExportFormat::Csv)?;
    written.push(path);

    for metric in PivotMetric::BUNDLED {
        let path = dir.join(format!("{}.csv", metric.file_stem()));
        report.pivot(metric).export_to_file(&path, ExportFormat::Csv)?;
        written.push(path);
    }

    for (valuation, stem) in report.valuations.iter().zip(&stems) {
        let path = dir.join(format!("{}.csv", stem));
        valuation.export_to_file(&path, ExportFormat::Csv)?;
        debug!(bank = %valuation.bank, path = %path.display(), "wrote bank table");
        written.push(path);
    }

    let path = dir.join(SUMMARY_CSV_FILE);
    report.summaries.export_to_file(&path, ExportFormat::Csv)?;
    written.push(path);

    let path = dir.join(REPORT_FILE);
    fs::write(&path, report.to_json()?)?;
    written.push(path);

    let path = dir.join(SUMMARY_FILE);
    fs::write(&path, report.to_markdown())?;
    written.push(path);

    if consolidated.is_empty() {
        debug!("no priced year, skipping charts");
    } else {
        for metric in CHARTED {
            let path = dir.join(format!("{}.svg", metric.file_stem()));
            fs::write(&path, pivot_chart(&report.pivot(metric))?)?;
            written.push(path);
        }

        for (valuation, stem) in report.valuations.iter().zip(&stems) {
            if valuation.rows.is_empty() {
                continue;
            }
            let path = dir.join(format!("{}_roe_ke.svg", stem));
            fs::write(&path, roe_vs_ke_chart(valuation)?)?;
            written.push(path);

            let path = dir.join(format!("{}_spread.svg", stem));
            fs::write(&path, spread_chart(valuation)?)?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), files = written.len(), "wrote report bundle");
    Ok(written)
}
