// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consistent file copies of a vault database.
//!
//! Uses SQLite's online backup API, so a copy taken while the log is being
//! appended to still reflects one committed state.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use vaultlog_core::VaultError;

use crate::database::map_sqlite_err;

/// Pages copied per backup step.
const PAGES_PER_STEP: std::os::raw::c_int = 100;

/// Copy the database at `src` over `dst`, creating `dst` if needed.
pub fn copy_database(src: &Path, dst: &Path) -> Result<(), VaultError> {
    if !src.exists() {
        return Err(VaultError::storage(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("database not found: {}", src.display()),
        )));
    }
    let source = Connection::open_with_flags(
        src,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(map_sqlite_err)?;
    let mut dest = Connection::open(dst).map_err(map_sqlite_err)?;

    let backup = rusqlite::backup::Backup::new(&source, &mut dest).map_err(map_sqlite_err)?;
    backup
        .run_to_completion(PAGES_PER_STEP, Duration::from_millis(10), None)
        .map_err(map_sqlite_err)?;
    debug!(from = %src.display(), to = %dst.display(), "database copied");
    Ok(())
}

/// Check that `path` is an intact SQLite file holding a vault key record.
pub fn check_snapshot(path: &Path) -> Result<(), VaultError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|_| VaultError::InvalidBackup("not a database".into()))?;
    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|_| VaultError::InvalidBackup("not a database".into()))?;
    if integrity != "ok" {
        return Err(VaultError::InvalidBackup(format!(
            "integrity check failed: {integrity}"
        )));
    }
    let keys: i64 = conn
        .query_row("SELECT COUNT(*) FROM system_keys", [], |row| row.get(0))
        .map_err(|_| VaultError::InvalidBackup("no vault schema".into()))?;
    if keys != 1 {
        return Err(VaultError::InvalidBackup("no key record".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn copy_of_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_database(&dir.path().join("absent.db"), &dir.path().join("copy.db"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn copied_database_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.db");
        let db = Database::open(&src, Duration::from_millis(100)).unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO events (sequence_id, stream_type, stream_id, ciphertext, nonce,
                     chain_tag, timestamp)
                 VALUES (1, 'audit', 's', x'00', x'00', x'00', 'now');",
            )
            .map_err(map_sqlite_err)
        })
        .unwrap();

        let dst = dir.path().join("copy.db");
        copy_database(&src, &dst).unwrap();
        let copy = Connection::open(&dst).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn snapshot_without_key_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Database::open(&path, Duration::from_millis(100)).unwrap().close().unwrap();
        assert!(matches!(
            check_snapshot(&path),
            Err(VaultError::InvalidBackup(_))
        ));

        let junk = dir.path().join("junk.db");
        std::fs::write(&junk, b"definitely not sqlite, just some bytes here").unwrap();
        assert!(matches!(
            check_snapshot(&junk),
            Err(VaultError::InvalidBackup(_))
        ));
    }
}
