//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The ledger, session gate and importers call `StoreConn` methods,
//! they never execute SQL directly.
//!
//! Every mutating operation runs through `LedgerStore::atomically`,
//! which holds the connection for the whole read-modify-write and wraps
//! it in one `BEGIN IMMEDIATE` transaction. Balance writes and the
//! record that explains them commit together or not at all.

mod bundles;
mod events;
mod session;
mod transactions;
mod users;

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, Row, TransactionBehavior};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Ordered schema migrations. Versions are never renumbered.
const MIGRATIONS: &[(u32, &str, &str)] = &[
    (1, "foundation", include_str!("../../../migrations/001_foundation.sql")),
    (2, "event_log",  include_str!("../../../migrations/002_event_log.sql")),
];

pub const SCHEMA_VERSION: u32 = 2;

pub struct LedgerStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:, Some(path) for file
    busy_timeout: Duration,
}

/// A borrowed connection, either inside an open transaction or a plain read.
pub struct StoreConn<'c> {
    conn: &'c Connection,
}

impl LedgerStore {
    pub fn open(path: &str, busy_timeout: Duration) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
            busy_timeout,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            busy_timeout: Duration::ZERO,
        })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p, self.busy_timeout),
            None => Self::in_memory(),
        }
    }

    /// Apply every migration newer than the recorded schema version.
    /// Returns the schema version after migrating.
    pub fn migrate(&self) -> LedgerResult<u32> {
        let mut conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                 version    INTEGER PRIMARY KEY,
                 name       TEXT NOT NULL,
                 applied_at TEXT NOT NULL
             );",
        )?;
        let current: u32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![version, name, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            log::debug!("store: applied migration {version:03} {name}");
        }
        Ok(current.max(SCHEMA_VERSION))
    }

    pub fn schema_version(&self) -> LedgerResult<u32> {
        let conn = self.lock();
        let version = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Run `f` inside one immediate transaction.
    /// Commits when `f` returns `Ok`, rolls back on `Err`.
    pub fn atomically<T>(
        &self,
        f: impl FnOnce(&StoreConn<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&StoreConn { conn: &*tx })?;
        tx.commit()?;
        Ok(out)
    }

    /// Run a read-only closure against the latest committed state.
    pub fn read<T>(&self, f: impl FnOnce(&StoreConn<'_>) -> LedgerResult<T>) -> LedgerResult<T> {
        let conn = self.lock();
        f(&StoreConn { conn: &*conn })
    }

    /// A panic inside `atomically` drops the open transaction, which rolls
    /// it back, so the connection is still consistent after poisoning.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Column codecs ─────────────────────────────────────────────────

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn row_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn row_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn row_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = LedgerError>,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn row_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}
