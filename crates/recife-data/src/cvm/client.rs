//! CVM open data portal client with rate limiting.

use crate::cvm::dfp::DfpArchive;
use crate::error::{DataError, Result};
use crate::rate_limit::RateLimiter;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Base URL of the DFP datasets on the CVM portal
const CVM_DFP_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/DFP/DADOS";

/// Default spacing between archive downloads
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(250);

/// Yearly archives run to tens of megabytes
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

const USER_AGENT: &str = "Recife-ExcessReturn/0.1";

/// Archives in flight in [`CvmClient::dfp_archive_stream`]
pub const DFP_CONCURRENCY: usize = 4;

/// CVM DFP archive client
pub struct CvmClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
}

impl CvmClient {
    /// Create a new CVM client with default settings
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(DEFAULT_RATE_LIMIT)
    }

    /// Create a new CVM client with a custom minimum interval between requests
    pub fn with_rate_limit(min_interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(min_interval))),
            base_url: CVM_DFP_BASE_URL.to_string(),
        })
    }

    /// Point the client at a mirror of the DFP dataset directory.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the DFP archive for a fiscal year.
    pub fn archive_url(&self, year: i32) -> String {
        format!("{}/dfp_cia_aberta_{}.zip", self.base_url, year)
    }

    /// Download the DFP archive for a fiscal year.
    ///
    /// # Errors
    /// Returns `DataError::CvmApi` when the portal does not serve the year
    /// (typically years before 2010 or the current, unpublished year).
    pub async fn fetch_dfp_archive(&self, year: i32) -> Result<DfpArchive> {
        self.rate_limiter.lock().await.wait().await;

        let url = self.archive_url(year);
        debug!(%url, "requesting DFP archive");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::CvmApi(format!(
                "DFP {} unavailable: HTTP {}",
                year,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(DataError::Network)?;
        debug!(year, size = bytes.len(), "downloaded DFP archive");

        DfpArchive::from_bytes(year, bytes.to_vec())
    }

    /// Download several years, yielding each result as it completes.
    pub fn dfp_archive_stream(
        &self,
        years: Vec<i32>,
    ) -> impl Stream<Item = (i32, Result<DfpArchive>)> + '_ {
        stream::iter(years)
            .map(move |year| async move { (year, self.fetch_dfp_archive(year).await) })
            .buffer_unordered(DFP_CONCURRENCY)
    }

    /// Download several years, skipping the ones that cannot be obtained.
    ///
    /// Archives are returned in year order.
    ///
    /// # Errors
    /// Returns `DataError::MissingData` when no year could be downloaded.
    pub async fn fetch_dfp_archives(&self, years: &[i32]) -> Result<Vec<DfpArchive>> {
        let mut archives = Vec::with_capacity(years.len());
        let mut results = std::pin::pin!(self.dfp_archive_stream(years.to_vec()));

        while let Some((year, result)) = results.next().await {
            match result {
                Ok(archive) => archives.push(archive),
                Err(e) => warn!(year, error = %e, "skipping DFP year"),
            }
        }

        if archives.is_empty() {
            return Err(DataError::MissingData {
                symbol: "DFP".to_string(),
                reason: format!("no archive obtained for years {:?}", years),
            });
        }

        archives.sort_by_key(DfpArchive::year);
        Ok(archives)
    }
}

impl std::fmt::Debug for CvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvmClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
