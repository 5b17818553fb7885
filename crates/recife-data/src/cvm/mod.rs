//! CVM open data: annual standardized financial statements (DFP).
//!
//! CVM publishes one zip archive per year containing every listed company's
//! DFP filing as `;`-separated, Latin-1 encoded CSV files. This module:
//! - downloads the yearly archives ([`CvmClient`])
//! - locates and decodes the consolidated DRE and BPP statements ([`DfpArchive`])
//! - derives net income and controlling shareholders' equity per fiscal year
//!   ([`extract_net_income`], [`extract_controlling_equity`])
//!
//! # Example
//!
//! ```no_run
//! use recife_data::cvm::{CvmClient, StatementKind, extract_net_income};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CvmClient::new()?;
//!     let mut archive = client.fetch_dfp_archive(2023).await?;
//!     let dre = archive.statement(StatementKind::Income)?;
//!     let income = extract_net_income(&dre, "60.872.504/0001-23");
//!     println!("{:?}", income);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dfp;
pub mod statements;

pub use client::{CvmClient, DFP_CONCURRENCY};
pub use dfp::{DfpArchive, DfpRecord, FiscalOrder, StatementKind, parse_dfp_csv, parse_dfp_csv_filtered};
pub use statements::{
    EQUITY_TOTAL_ACCOUNT, NON_CONTROLLING_ACCOUNT, extract_controlling_equity, extract_net_income,
    normalize_cnpj,
};
