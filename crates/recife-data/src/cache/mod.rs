//! Caching layer for downloaded data.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};
