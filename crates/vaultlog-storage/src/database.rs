// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! One [`Database`] owns at most one open connection. Every statement runs
//! while holding its mutex, so writes are serialized without a writer thread.
//! Do NOT open additional connections for writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::debug;

use vaultlog_config::model::StorageConfig;
use vaultlog_core::VaultError;

use crate::migrations::run_migrations;

/// A SQLite database file with a lazily opened connection.
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Open the database at `path`, creating parent directories and running
    /// migrations.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, VaultError> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
            conn: Mutex::new(None),
        };
        db.with_conn(|_| Ok(()))?;
        Ok(db)
    }

    /// Open the database described by the `[storage]` config section.
    pub fn from_config(config: &StorageConfig) -> Result<Self, VaultError> {
        Self::open(
            &config.database_path,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a connection is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Run `f` against the connection, opening it first if it was released.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(VaultError::Internal("connection slot empty after open".into())),
        }
    }

    /// Close the connection. The next call to [`Database::with_conn`] reopens it.
    pub fn close(&self) -> Result<(), VaultError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| map_sqlite_err(e))?;
        debug!(path = %self.path.display(), "database connection closed");
        Ok(())
    }

    fn connect(&self) -> Result<Connection, VaultError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(VaultError::storage)?;
        }

        let mut conn = Connection::open(&self.path).map_err(map_sqlite_err)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(map_sqlite_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA foreign_keys = OFF;
             PRAGMA secure_delete = ON;",
        )
        .map_err(map_sqlite_err)?;
        run_migrations(&mut conn)?;

        debug!(path = %self.path.display(), "database connection opened");
        Ok(conn)
    }
}

/// Convert a rusqlite error into a storage error.
pub fn map_sqlite_err(e: rusqlite::Error) -> VaultError {
    VaultError::storage(e)
}

/// Whether `e` is a UNIQUE or PRIMARY KEY constraint failure.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.db");
        let db = Database::open(&path, Duration::from_millis(100)).unwrap();
        assert!(path.exists());
        assert!(db.is_open());
    }

    #[test]
    fn close_then_reopen_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("events.db"), Duration::from_millis(100)).unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        // Idempotent.
        db.close().unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
                    .map_err(map_sqlite_err)
            })
            .unwrap();
        assert_eq!(count, 0);
        assert!(db.is_open());
    }

    #[test]
    fn journal_mode_is_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("events.db"), Duration::from_millis(100)).unwrap();
        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))
                    .map_err(map_sqlite_err)
            })
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
