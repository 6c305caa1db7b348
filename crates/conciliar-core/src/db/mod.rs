//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `statements` - Statements, imported lines, rolling counters
//! - `records` - Internal (accounting) records and unmatched listings
//! - `matching` - Batch auto-match, manual match/unmatch, suggestions
//! - `suspense` - Resolve and materialize flows for suspense lines
//! - `reports` - Summaries recomputed from item rows

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::TransactionBehavior;
use tracing::info;

use crate::config::MatchingConfig;
use crate::error::Result;

mod matching;
mod record_filter;
mod records;
mod reports;
mod statements;
mod suspense;

pub use record_filter::{FilterResult, RecordFilter};
pub use suspense::classify_description;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Actor recorded on matches applied by the batch pass
pub const AUTO_MATCH_ACTOR: &str = "auto-match";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Our own writes carry microseconds; SQLite defaults do not
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a timestamp the way `parse_datetime` reads it back
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub(crate) fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    config: Arc<MatchingConfig>,
}

impl Database {
    /// Open (or create) a database with the default matching configuration
    pub fn new(path: &str) -> Result<Self> {
        Self::with_config(path, MatchingConfig::default())
    }

    /// Open (or create) a database with an explicit matching configuration
    pub fn with_config(path: &str, config: MatchingConfig) -> Result<Self> {
        config.validate()?;

        // Per-connection settings: every pooled connection gets them
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            config: Arc::new(config),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Matching configuration used by scoring and batch passes
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        Self::in_memory_with_config(MatchingConfig::default())
    }

    /// Throwaway database with a custom matching configuration
    pub fn in_memory_with_config(config: MatchingConfig) -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "conciliar_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any leftovers from an earlier run
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path, suffix));
        }

        Self::with_config(&path, config)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` as one unit of work
    ///
    /// The transaction is IMMEDIATE so the write lock is taken up front and
    /// reads inside `f` see state no other writer can change before commit.
    /// Returning `Err` from `f` rolls everything back.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the batch writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Statements (one imported batch per account and period)
            CREATE TABLE IF NOT EXISTS statements (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                period_label TEXT NOT NULL,
                amount_tolerance_pct REAL NOT NULL,
                date_tolerance_days INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'EN_PROCESO',   -- EN_PROCESO, COMPLETADA
                total_items INTEGER NOT NULL DEFAULT 0,
                matched_count INTEGER NOT NULL DEFAULT 0,
                pending_count INTEGER NOT NULL DEFAULT 0,
                suspense_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                CHECK (matched_count + pending_count = total_items),
                CHECK (matched_count >= 0 AND pending_count >= 0 AND suspense_count >= 0),
                CHECK (suspense_count <= pending_count)
            );

            CREATE INDEX IF NOT EXISTS idx_statements_company ON statements(company_id, account_id);

            -- Internal records (cash movements known to accounting)
            CREATE TABLE IF NOT EXISTS internal_records (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                date DATE NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                direction TEXT NOT NULL,                     -- inflow, outflow, any
                category TEXT NOT NULL DEFAULT 'adjustment',
                document_number TEXT,
                counterparty_id INTEGER,
                counterparty_name TEXT,
                description TEXT,
                source TEXT NOT NULL DEFAULT 'accounting',  -- accounting, suspense
                conciliado INTEGER NOT NULL DEFAULT 0,
                conciliado_at DATETIME,
                conciliado_by TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_records_pool
                ON internal_records(company_id, account_id, conciliado, direction);
            CREATE INDEX IF NOT EXISTS idx_records_date ON internal_records(date);

            -- Statement items (bank lines)
            CREATE TABLE IF NOT EXISTS statement_items (
                id INTEGER PRIMARY KEY,
                statement_id INTEGER NOT NULL REFERENCES statements(id) ON DELETE CASCADE,
                date DATE NOT NULL,
                amount REAL NOT NULL,                        -- signed: credit positive
                direction TEXT NOT NULL,                     -- inflow, outflow
                reference TEXT,
                description TEXT NOT NULL DEFAULT '',
                conciliado INTEGER NOT NULL DEFAULT 0,
                match_type TEXT,                             -- EXACT, FUZZY, REFERENCE, MANUAL
                match_confidence REAL
                    CHECK (match_confidence IS NULL OR (match_confidence >= 0 AND match_confidence <= 1)),
                conciliado_at DATETIME,
                conciliado_by TEXT,
                record_id INTEGER REFERENCES internal_records(id),
                es_suspense INTEGER NOT NULL DEFAULT 0,
                suspense_resuelto INTEGER NOT NULL DEFAULT 0,
                suspense_notas TEXT,
                suspense_resuelto_by TEXT,
                suspense_resuelto_at DATETIME,
                suspense_cleared_by_match INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_items_statement ON statement_items(statement_id, conciliado);
            -- A record is linked from at most one line
            CREATE UNIQUE INDEX IF NOT EXISTS idx_items_record
                ON statement_items(record_id) WHERE record_id IS NOT NULL;
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
