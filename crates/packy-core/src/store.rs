//! Durable package → maintainer index with per-action flags, backed by SQLite.
//!
//! # Table design
//!
//! ```text
//! packages(package TEXT PRIMARY KEY,
//!          maintainer TEXT NOT NULL,
//!          move_flag INTEGER NOT NULL,
//!          update_flag INTEGER NOT NULL,
//!          last_seen INTEGER NOT NULL)   -- unix milliseconds
//! ```
//!
//! Every method is a single statement and therefore atomic on its own; there
//! are no cross-call transactions. The cycle scheduler is the only writer,
//! HTTP handlers only read.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::flags::{Flag, FlagFilter};
use crate::types::ActionType;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS packages (
    package     TEXT PRIMARY KEY,
    maintainer  TEXT NOT NULL,
    move_flag   INTEGER NOT NULL DEFAULT 0,
    update_flag INTEGER NOT NULL DEFAULT 0,
    last_seen   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS packages_maintainer ON packages (maintainer);
";

const COLUMNS: &str = "package, maintainer, move_flag, update_flag, last_seen";

// ---------------------------------------------------------------------------
// PackageRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub package: String,
    pub maintainer: String,
    pub move_flag: Flag,
    pub update_flag: Flag,
    pub last_seen: DateTime<Utc>,
}

impl PackageRecord {
    pub fn flag(&self, action: ActionType) -> Flag {
        match action {
            ActionType::Move => self.move_flag,
            ActionType::Update => self.update_flag,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let last_seen: i64 = row.get(4)?;
        Ok(Self {
            package: row.get(0)?,
            maintainer: row.get(1)?,
            move_flag: Flag::from_raw(row.get(2)?),
            update_flag: Flag::from_raw(row.get(3)?),
            last_seen: DateTime::from_timestamp_millis(last_seen).unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// PackageStore
// ---------------------------------------------------------------------------

pub struct PackageStore {
    conn: Mutex<Connection>,
}

impl PackageStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened package store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a statement half-applied.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Ownership
    // -----------------------------------------------------------------------

    /// Insert `package` with zeroed flags, or update only its maintainer and
    /// `last_seen` if it already exists.
    pub fn upsert_ownership(
        &self,
        package: &str,
        maintainer: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO packages (package, maintainer, move_flag, update_flag, last_seen)
             VALUES (?1, ?2, 0, 0, ?3)
             ON CONFLICT(package) DO UPDATE
             SET maintainer = excluded.maintainer, last_seen = excluded.last_seen",
            params![package, maintainer, seen_at.timestamp_millis()],
        )?;
        Ok(())
    }

    /// Delete every record last seen before `cutoff`. Returns the number removed.
    pub fn purge_stale_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let n = self.conn().execute(
            "DELETE FROM packages WHERE last_seen < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(n)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, package: &str) -> Result<Option<PackageRecord>> {
        let record = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM packages WHERE package = ?1"),
                params![package],
                PackageRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All package names, optionally restricted to those starting with `prefix`.
    pub fn list_packages(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let conn = self.conn();
        let names = match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => {
                let mut stmt = conn.prepare(
                    "SELECT package FROM packages
                     WHERE substr(package, 1, length(?1)) = ?1
                     ORDER BY package",
                )?;
                let rows = stmt.query_map(params![prefix], |r| r.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT package FROM packages ORDER BY package")?;
                let rows = stmt.query_map([], |r| r.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
        };
        Ok(names)
    }

    /// Records owned by `maintainer` whose `action` flag matches `filter`,
    /// ordered by package name.
    pub fn list_by_maintainer(
        &self,
        maintainer: &str,
        action: ActionType,
        filter: FlagFilter,
    ) -> Result<Vec<PackageRecord>> {
        let (op, value) = filter.sql();
        let sql = format!(
            "SELECT {COLUMNS} FROM packages
             WHERE maintainer = ?1 AND {col} {op} ?2
             ORDER BY package",
            col = action.column(),
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![maintainer, value], PackageRecord::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_by_maintainer(
        &self,
        maintainer: &str,
        action: ActionType,
        filter: FlagFilter,
    ) -> Result<usize> {
        let (op, value) = filter.sql();
        let sql = format!(
            "SELECT COUNT(*) FROM packages WHERE maintainer = ?1 AND {col} {op} ?2",
            col = action.column(),
        );
        let count: i64 = self
            .conn()
            .query_row(&sql, params![maintainer, value], |r| r.get(0))?;
        Ok(count as usize)
    }

    /// Number of packages owned by `maintainer`, flagged or not.
    pub fn count_owned(&self, maintainer: &str) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM packages WHERE maintainer = ?1",
            params![maintainer],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    /// Distinct maintainers currently owning at least one package.
    pub fn maintainers(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT DISTINCT maintainer FROM packages ORDER BY maintainer")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    // -----------------------------------------------------------------------
    // Flag mutators
    // -----------------------------------------------------------------------

    /// Set one package's flag. Returns false if the package is unknown.
    pub fn set_flag(&self, package: &str, action: ActionType, flag: Flag) -> Result<bool> {
        let n = self.conn().execute(
            &format!(
                "UPDATE packages SET {col} = ?1 WHERE package = ?2",
                col = action.column()
            ),
            params![flag.as_raw(), package],
        )?;
        Ok(n > 0)
    }

    /// Raw `+1` on one package's flag. Returns false if the package is unknown.
    pub fn increment_flag(&self, package: &str, action: ActionType) -> Result<bool> {
        let n = self.conn().execute(
            &format!(
                "UPDATE packages SET {col} = {col} + 1 WHERE package = ?1",
                col = action.column()
            ),
            params![package],
        )?;
        Ok(n > 0)
    }

    /// Bulk-move every record whose flag matches `from` to `to`.
    /// Returns the number of records changed.
    pub fn reset_flags_in_state(
        &self,
        action: ActionType,
        from: FlagFilter,
        to: Flag,
    ) -> Result<usize> {
        let (op, value) = from.sql();
        let n = self.conn().execute(
            &format!(
                "UPDATE packages SET {col} = ?1 WHERE {col} {op} ?2",
                col = action.column()
            ),
            params![to.as_raw(), value],
        )?;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
