#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bundle;
pub mod chart;
pub mod export;
pub mod pivot;
pub mod report;
pub mod summary;

pub use bundle::{
    CONSOLIDATED_FILE, REPORT_FILE, SUMMARY_CSV_FILE, SUMMARY_FILE, write_report_bundle,
};
pub use chart::{CHARTED, pivot_chart, roe_vs_ke_chart, spread_chart};
pub use export::{BankValuation, ConsolidatedRow, ExportError, ExportFormat, Exporter};
pub use pivot::{PivotMetric, PivotRow, PivotTable};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{
    format_brl, format_pct, slugify, summary_ascii_table, summary_markdown_table,
};
