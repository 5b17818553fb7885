//! Cache manager for downloaded data.
//!
//! Opens the SQLite cache at a platform-specific default location and
//! shares it between the concurrent download tasks.

use recife_data::cache::SqliteCache;
use recife_data::error::DataError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Cache shared across download tasks; `None` when caching is disabled.
pub(crate) type SharedCache = Arc<Mutex<Option<SqliteCache>>>;

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/recife/`
/// - macOS: `~/Library/Caches/recife/`
/// - Windows: `%LOCALAPPDATA%\recife\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recife")
}

/// Get the default cache database path.
pub(crate) fn cache_path() -> PathBuf {
    default_cache_dir().join("recife.db")
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache() -> Result<SqliteCache, DataError> {
    let cache_path = cache_path();

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    SqliteCache::new(&cache_path)
}

/// Open the cache for a pipeline run.
///
/// A cache that cannot be opened disables caching for the run.
pub(crate) fn shared_cache(use_cache: bool) -> SharedCache {
    let cache = if use_cache {
        match open_cache() {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, path = %cache_path().display(), "cache unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };
    Arc::new(Mutex::new(cache))
}

/// Print cache location and contents.
pub(crate) fn print_cache_info() {
    println!("  Cache location: {}", cache_path().display());
    match open_cache().and_then(|cache| cache.get_stats()) {
        Ok(stats) => {
            println!(
                "  Statements: {} lines, {} companies, {} fiscal years",
                stats.statement_lines, stats.companies, stats.dfp_years
            );
            println!(
                "  Quotes: {} rows for {} symbols",
                stats.total_quotes, stats.unique_symbols
            );
            println!("  Daily rates: {} observations", stats.daily_rates);
        }
        Err(e) => println!("  Cache unavailable: {}", e),
    }
}
