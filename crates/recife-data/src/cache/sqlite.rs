//! SQLite caching layer for statements, rates and quotes.

use crate::bcb::DailyRate;
use crate::cvm::{DfpRecord, FiscalOrder, StatementKind, normalize_cnpj};
use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use polars::prelude::*;
use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite cache for market and accounting data.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

/// Latest `MM-DD` a complete year of daily rates may start on.
const FIRST_SESSION_BY: &str = "01-10";

/// Earliest `MM-DD` a complete year of daily rates may end on.
const LAST_SESSION_FROM: &str = "12-20";

fn parse_db_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

impl SqliteCache {
    /// Create a new SQLite cache.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                adjusted_close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quotes_symbol_date ON quotes(symbol, date)",
            [],
        )?;

        // Own-year DFP lines of tracked companies
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS statement_lines (
                cnpj TEXT NOT NULL,
                kind TEXT NOT NULL,
                reference_date TEXT NOT NULL,
                period_end TEXT,
                account_code TEXT NOT NULL,
                description TEXT NOT NULL,
                value REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (cnpj, kind, reference_date, account_code, description)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_statement_lines_cnpj ON statement_lines(cnpj, kind)",
            [],
        )?;

        // Which (year, company) pairs have been read from a DFP archive
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS dfp_ingestions (
                year INTEGER NOT NULL,
                cnpj TEXT NOT NULL,
                ingested_at TEXT NOT NULL,
                PRIMARY KEY (year, cnpj)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_rates (
                series INTEGER NOT NULL,
                date TEXT NOT NULL,
                rate_pct REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (series, date)
            )",
            [],
        )?;

        Ok(())
    }

    /// Check if quotes are cached for a symbol and date range.
    pub fn has_quotes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3",
            params![symbol, start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;

        // B3 trades roughly 245 sessions a year, about two thirds of calendar days
        let days = (end - start).num_days();
        let expected_count = (days as f64 * 0.6) as i64;

        Ok(count > 0 && count >= expected_count)
    }

    /// Get cached quotes for a symbol and date range.
    pub fn get_quotes(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, date, close, adjusted_close
             FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let mut symbols = Vec::new();
        let mut dates = Vec::new();
        let mut closes = Vec::new();
        let mut adj_closes = Vec::new();

        let rows = stmt.query_map(params![symbol, start.to_string(), end.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        for row in rows {
            let (sym, date, close, adj_close) = row?;
            symbols.push(sym);
            dates.push(date);
            closes.push(close);
            adj_closes.push(adj_close);
        }

        if dates.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No cached data found".to_string(),
            });
        }

        let df = DataFrame::new(vec![
            Series::new("symbol".into(), symbols).into(),
            Series::new("date".into(), dates).into(),
            Series::new("close".into(), closes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        // Convert date strings to Date type
        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        Ok(df)
    }

    /// Store quotes in the cache.
    pub fn put_quotes(&self, df: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let symbols = df.column("symbol")?.str()?;
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let closes = df.column("close")?.f64()?;
        let adj_closes = df.column("adjusted_close")?.f64()?;

        let tx = self.conn.unchecked_transaction()?;

        for i in 0..df.height() {
            let symbol = symbols
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing symbol".to_string()))?;
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing date".to_string()))?;
            let close = closes
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing close".to_string()))?;
            let adj_close = adj_closes
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing adjusted_close".to_string()))?;

            tx.execute(
                "INSERT OR REPLACE INTO quotes
                 (symbol, date, close, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![symbol, date, close, adj_close, cached_at],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Whether the DFP of `year` has already been read for a company.
    pub fn is_dfp_ingested(&self, year: i32, cnpj: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dfp_ingestions WHERE year = ?1 AND cnpj = ?2",
            params![year, normalize_cnpj(cnpj)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Mark the DFP of `year` as read for a company.
    pub fn mark_dfp_ingested(&self, year: i32, cnpj: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO dfp_ingestions (year, cnpj, ingested_at)
             VALUES (?1, ?2, ?3)",
            params![year, normalize_cnpj(cnpj), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Store the own-year lines of one company and return how many were
    /// stored.
    ///
    /// Prior-year comparative lines are not stored; the next archive carries
    /// them as its own year. The (year, company) pair is not marked as
    /// ingested; see [`Self::mark_dfp_ingested`].
    pub fn put_dfp_lines(&self, cnpj: &str, records: &[DfpRecord]) -> Result<usize> {
        let cached_at = Utc::now().to_rfc3339();
        let cnpj = normalize_cnpj(cnpj);
        let tx = self.conn.unchecked_transaction()?;
        let mut stored = 0;

        for record in records
            .iter()
            .filter(|r| r.order == FiscalOrder::Last && normalize_cnpj(&r.cnpj) == cnpj)
        {
            tx.execute(
                "INSERT OR REPLACE INTO statement_lines
                 (cnpj, kind, reference_date, period_end, account_code, description, value, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    cnpj,
                    record.kind.prefix(),
                    record.reference_date.to_string(),
                    record.period_end.map(|d| d.to_string()),
                    record.account_code,
                    record.description,
                    record.value,
                    cached_at
                ],
            )?;
            stored += 1;
        }

        tx.commit()?;
        Ok(stored)
    }

    /// Cached own-year lines of a company for one statement.
    pub fn get_dfp_lines(&self, cnpj: &str, kind: StatementKind) -> Result<Vec<DfpRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT cnpj, reference_date, period_end, account_code, description, value
             FROM statement_lines
             WHERE cnpj = ?1 AND kind = ?2
             ORDER BY reference_date ASC, account_code ASC",
        )?;

        let rows = stmt.query_map(params![normalize_cnpj(cnpj), kind.prefix()], |row| {
            let period_end: Option<String> = row.get(2)?;
            Ok(DfpRecord {
                kind,
                cnpj: row.get(0)?,
                reference_date: parse_db_date(&row.get::<_, String>(1)?)?,
                period_end: period_end.as_deref().map(parse_db_date).transpose()?,
                order: FiscalOrder::Last,
                account_code: row.get(3)?,
                description: row.get(4)?,
                value: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Whether every calendar year in `[start_year, end_year]` has daily rates
    /// from its first to its last business days.
    ///
    /// The current year is never complete.
    pub fn has_daily_rates(&self, series: u32, start_year: i32, end_year: i32) -> Result<bool> {
        if end_year >= Utc::now().year() {
            return Ok(false);
        }

        let mut stmt = self.conn.prepare(
            "SELECT substr(date, 1, 4), MIN(date), MAX(date) FROM daily_rates
             WHERE series = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY substr(date, 1, 4)",
        )?;
        let rows = stmt.query_map(
            params![
                series,
                format!("{:04}-01-01", start_year),
                format!("{:04}-12-31", end_year)
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let mut covered = 0;
        for row in rows {
            let (year, first, last) = row?;
            if first <= format!("{}-{}", year, FIRST_SESSION_BY)
                && last >= format!("{}-{}", year, LAST_SESSION_FROM)
            {
                covered += 1;
            }
        }
        Ok(covered == end_year - start_year + 1)
    }

    /// Cached daily rates of a series between two calendar years, inclusive.
    pub fn get_daily_rates(
        &self,
        series: u32,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<DailyRate>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, rate_pct FROM daily_rates
             WHERE series = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(
            params![
                series,
                format!("{:04}-01-01", start_year),
                format!("{:04}-12-31", end_year)
            ],
            |row| {
                Ok(DailyRate {
                    date: parse_db_date(&row.get::<_, String>(0)?)?,
                    rate_pct: row.get(1)?,
                })
            },
        )?;

        let mut rates = Vec::new();
        for row in rows {
            rates.push(row?);
        }
        Ok(rates)
    }

    /// Store daily rates of a series.
    pub fn put_daily_rates(&self, series: u32, rates: &[DailyRate]) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        for rate in rates {
            tx.execute(
                "INSERT OR REPLACE INTO daily_rates (series, date, rate_pct, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![series, rate.date.to_string(), rate.rate_pct, cached_at],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Clear all cached data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM quotes", [])?;
        self.conn.execute("DELETE FROM statement_lines", [])?;
        self.conn.execute("DELETE FROM dfp_ingestions", [])?;
        self.conn.execute("DELETE FROM daily_rates", [])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(CacheStats {
            total_quotes: count("SELECT COUNT(*) FROM quotes")?,
            unique_symbols: count("SELECT COUNT(DISTINCT symbol) FROM quotes")?,
            statement_lines: count("SELECT COUNT(*) FROM statement_lines")?,
            companies: count("SELECT COUNT(DISTINCT cnpj) FROM dfp_ingestions")?,
            dfp_years: count("SELECT COUNT(DISTINCT year) FROM dfp_ingestions")?,
            daily_rates: count("SELECT COUNT(*) FROM daily_rates")?,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of quote records
    pub total_quotes: usize,
    /// Number of unique symbols
    pub unique_symbols: usize,
    /// Number of cached statement lines
    pub statement_lines: usize,
    /// Number of companies with ingested DFP data
    pub companies: usize,
    /// Number of fiscal years with ingested DFP data
    pub dfp_years: usize,
    /// Number of cached daily rate observations
    pub daily_rates: usize,
}
