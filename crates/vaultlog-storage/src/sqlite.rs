// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`EventStore`] trait.

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use tracing::{debug, warn};

use vaultlog_config::model::StorageConfig;
use vaultlog_core::types::{NONCE_LEN, SALT_LEN};
use vaultlog_core::{
    ChainTag, EventRecord, EventStore, KdfParams, MalformedEvent, QuarantineReason, RecoveryWrap,
    SealedPayload, StoredEvent, SystemKeyRecord, VaultError,
};

use crate::database::{is_constraint_violation, map_sqlite_err, Database};

const EVENT_COLUMNS: &str = "sequence_id, stream_type, stream_id, ciphertext, nonce, chain_tag,
     timestamp, quarantined, quarantine_reason";

const KEY_COLUMNS: &str = "salt, wrapped_epoch_secret, wrap_nonce, kdf_memory_kib,
     kdf_iterations, kdf_parallelism, created_at, recovery_salt,
     recovery_wrapped_epoch_secret, recovery_wrap_nonce, recovery_kdf_memory_kib,
     recovery_kdf_iterations, recovery_kdf_parallelism, recovery_created_at";

/// SQLite-backed event store.
///
/// Wraps a [`Database`]. [`EventStore::release`] closes the connection; the
/// next operation reopens it.
pub struct SqliteEventStore {
    db: Database,
}

impl SqliteEventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the store described by the `[storage]` config section.
    pub fn from_config(config: &StorageConfig) -> Result<Self, VaultError> {
        Ok(Self::new(Database::from_config(config)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl EventStore for SqliteEventStore {
    fn load_key_record(&self) -> Result<Option<SystemKeyRecord>, VaultError> {
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {KEY_COLUMNS} FROM system_keys WHERE id = 1"),
                    [],
                    RawKeyRow::from_row,
                )
                .optional()
                .map_err(map_sqlite_err)?;
            raw.map(RawKeyRow::into_record).transpose()
        })
    }

    fn insert_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError> {
        let row = KeyRowParams::from(record);
        self.db.with_conn(|conn| {
            let inserted = conn
                .execute(
                    &format!(
                        "INSERT INTO system_keys (id, {KEY_COLUMNS})
                         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                         ON CONFLICT(id) DO NOTHING"
                    ),
                    &row.values()[..],
                )
                .map_err(map_sqlite_err)?;
            if inserted == 0 {
                return Err(VaultError::AlreadyProvisioned);
            }
            debug!("system key record inserted");
            Ok(())
        })
    }

    fn replace_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError> {
        let row = KeyRowParams::from(record);
        self.db.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE system_keys SET salt = ?1, wrapped_epoch_secret = ?2,
                         wrap_nonce = ?3, kdf_memory_kib = ?4, kdf_iterations = ?5,
                         kdf_parallelism = ?6, created_at = ?7, recovery_salt = ?8,
                         recovery_wrapped_epoch_secret = ?9, recovery_wrap_nonce = ?10,
                         recovery_kdf_memory_kib = ?11, recovery_kdf_iterations = ?12,
                         recovery_kdf_parallelism = ?13, recovery_created_at = ?14
                     WHERE id = 1",
                    &row.values()[..],
                )
                .map_err(map_sqlite_err)?;
            if updated == 0 {
                return Err(VaultError::NotProvisioned);
            }
            debug!(recovery = record.recovery.is_some(), "system key record replaced");
            Ok(())
        })
    }

    fn append(&self, record: &EventRecord) -> Result<(), VaultError> {
        let seq = to_sql_seq(record.sequence_id)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (sequence_id, stream_type, stream_id, ciphertext, nonce,
                     chain_tag, timestamp, quarantined, quarantine_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    seq,
                    record.stream_type,
                    record.stream_id,
                    record.ciphertext,
                    &record.nonce[..],
                    &record.chain_tag.as_bytes()[..],
                    record.timestamp.to_rfc3339(),
                    record.quarantined,
                    record.quarantine_reason.map(<&'static str>::from),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    VaultError::storage(format!(
                        "duplicate sequence id {}",
                        record.sequence_id
                    ))
                } else {
                    map_sqlite_err(e)
                }
            })?;
            Ok(())
        })
    }

    fn get(&self, sequence_id: u64) -> Result<Option<StoredEvent>, VaultError> {
        let seq = to_sql_seq(sequence_id)?;
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE sequence_id = ?1"),
                    params![seq],
                    RawEventRow::from_row,
                )
                .optional()
                .map_err(map_sqlite_err)?;
            raw.map(RawEventRow::decode).transpose()
        })
    }

    fn scan(&self, range: RangeInclusive<u64>) -> Result<Vec<StoredEvent>, VaultError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let start = to_sql_seq(*range.start())?;
        // Anything above i64::MAX cannot exist in the table.
        let end = i64::try_from(*range.end()).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE sequence_id BETWEEN ?1 AND ?2
                     ORDER BY sequence_id ASC"
                ))
                .map_err(map_sqlite_err)?;
            let rows = stmt
                .query_map(params![start, end], RawEventRow::from_row)
                .map_err(map_sqlite_err)?;
            let mut records = Vec::new();
            for raw in rows {
                records.push(raw.map_err(map_sqlite_err)?.decode()?);
            }
            Ok(records)
        })
    }

    fn last(&self) -> Result<Option<StoredEvent>, VaultError> {
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    &format!(
                        "SELECT {EVENT_COLUMNS} FROM events ORDER BY sequence_id DESC LIMIT 1"
                    ),
                    [],
                    RawEventRow::from_row,
                )
                .optional()
                .map_err(map_sqlite_err)?;
            raw.map(RawEventRow::decode).transpose()
        })
    }

    fn mark_quarantined(
        &self,
        sequence_id: u64,
        reason: QuarantineReason,
    ) -> Result<(), VaultError> {
        let seq = to_sql_seq(sequence_id)?;
        self.db.with_conn(|conn| {
            // The first recorded reason wins.
            let updated = conn
                .execute(
                    "UPDATE events SET quarantined = 1,
                         quarantine_reason = COALESCE(quarantine_reason, ?2)
                     WHERE sequence_id = ?1",
                    params![seq, <&'static str>::from(reason)],
                )
                .map_err(map_sqlite_err)?;
            if updated == 0 {
                return Err(VaultError::EventNotFound(sequence_id));
            }
            warn!(sequence_id, %reason, "event quarantined");
            Ok(())
        })
    }

    fn release(&self) -> Result<(), VaultError> {
        self.db.close()
    }
}

fn to_sql_seq(sequence_id: u64) -> Result<i64, VaultError> {
    i64::try_from(sequence_id)
        .map_err(|_| VaultError::Internal(format!("sequence id {sequence_id} out of range")))
}

fn corrupt(what: &str) -> VaultError {
    VaultError::storage(format!("corrupted key record: {what}"))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Bound values for the fourteen key-record columns, in `KEY_COLUMNS` order.
struct KeyRowParams<'a> {
    salt: &'a [u8],
    wrapped_epoch_secret: &'a [u8],
    wrap_nonce: &'a [u8],
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    created_at: String,
    recovery_salt: Option<&'a [u8]>,
    recovery_wrapped_epoch_secret: Option<&'a [u8]>,
    recovery_wrap_nonce: Option<&'a [u8]>,
    recovery_memory_kib: Option<u32>,
    recovery_iterations: Option<u32>,
    recovery_parallelism: Option<u32>,
    recovery_created_at: Option<String>,
}

impl<'a> From<&'a SystemKeyRecord> for KeyRowParams<'a> {
    fn from(record: &'a SystemKeyRecord) -> Self {
        let recovery = record.recovery.as_ref();
        Self {
            salt: &record.salt,
            wrapped_epoch_secret: &record.wrapped_epoch_secret,
            wrap_nonce: &record.wrap_nonce,
            memory_kib: record.kdf_params.memory_kib,
            iterations: record.kdf_params.iterations,
            parallelism: record.kdf_params.parallelism,
            created_at: record.created_at.to_rfc3339(),
            recovery_salt: recovery.map(|w| &w.salt[..]),
            recovery_wrapped_epoch_secret: recovery.map(|w| &w.wrapped_epoch_secret[..]),
            recovery_wrap_nonce: recovery.map(|w| &w.wrap_nonce[..]),
            recovery_memory_kib: recovery.map(|w| w.kdf_params.memory_kib),
            recovery_iterations: recovery.map(|w| w.kdf_params.iterations),
            recovery_parallelism: recovery.map(|w| w.kdf_params.parallelism),
            recovery_created_at: recovery.map(|w| w.created_at.to_rfc3339()),
        }
    }
}

impl KeyRowParams<'_> {
    fn values(&self) -> [&dyn ToSql; 14] {
        [
            &self.salt,
            &self.wrapped_epoch_secret,
            &self.wrap_nonce,
            &self.memory_kib,
            &self.iterations,
            &self.parallelism,
            &self.created_at,
            &self.recovery_salt,
            &self.recovery_wrapped_epoch_secret,
            &self.recovery_wrap_nonce,
            &self.recovery_memory_kib,
            &self.recovery_iterations,
            &self.recovery_parallelism,
            &self.recovery_created_at,
        ]
    }
}

/// Column values as SQLite returns them, before length and enum checks.
struct RawKeyRow {
    salt: Vec<u8>,
    wrapped_epoch_secret: Vec<u8>,
    wrap_nonce: Vec<u8>,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    created_at: String,
    recovery_salt: Option<Vec<u8>>,
    recovery_wrapped_epoch_secret: Option<Vec<u8>>,
    recovery_wrap_nonce: Option<Vec<u8>>,
    recovery_memory_kib: Option<u32>,
    recovery_iterations: Option<u32>,
    recovery_parallelism: Option<u32>,
    recovery_created_at: Option<String>,
}

impl RawKeyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            salt: row.get(0)?,
            wrapped_epoch_secret: row.get(1)?,
            wrap_nonce: row.get(2)?,
            memory_kib: row.get(3)?,
            iterations: row.get(4)?,
            parallelism: row.get(5)?,
            created_at: row.get(6)?,
            recovery_salt: row.get(7)?,
            recovery_wrapped_epoch_secret: row.get(8)?,
            recovery_wrap_nonce: row.get(9)?,
            recovery_memory_kib: row.get(10)?,
            recovery_iterations: row.get(11)?,
            recovery_parallelism: row.get(12)?,
            recovery_created_at: row.get(13)?,
        })
    }

    fn into_record(self) -> Result<SystemKeyRecord, VaultError> {
        let recovery = match (
            self.recovery_salt,
            self.recovery_wrapped_epoch_secret,
            self.recovery_wrap_nonce,
            self.recovery_memory_kib,
            self.recovery_iterations,
            self.recovery_parallelism,
            self.recovery_created_at,
        ) {
            (None, None, None, None, None, None, None) => None,
            (
                Some(salt),
                Some(wrapped_epoch_secret),
                Some(wrap_nonce),
                Some(memory_kib),
                Some(iterations),
                Some(parallelism),
                Some(created_at),
            ) => Some(RecoveryWrap {
                salt: fixed(&salt, "recovery salt length")?,
                wrapped_epoch_secret,
                wrap_nonce: fixed(&wrap_nonce, "recovery wrap nonce length")?,
                kdf_params: KdfParams {
                    memory_kib,
                    iterations,
                    parallelism,
                },
                created_at: parse_timestamp(&created_at)
                    .ok_or_else(|| corrupt("recovery timestamp"))?,
            }),
            _ => return Err(corrupt("partial recovery wrap")),
        };

        Ok(SystemKeyRecord {
            salt: fixed::<SALT_LEN>(&self.salt, "salt length")?,
            wrapped_epoch_secret: self.wrapped_epoch_secret,
            wrap_nonce: fixed::<NONCE_LEN>(&self.wrap_nonce, "wrap nonce length")?,
            kdf_params: KdfParams {
                memory_kib: self.memory_kib,
                iterations: self.iterations,
                parallelism: self.parallelism,
            },
            created_at: parse_timestamp(&self.created_at).ok_or_else(|| corrupt("timestamp"))?,
            recovery,
        })
    }
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], VaultError> {
    bytes.try_into().map_err(|_| corrupt(what))
}

struct RawEventRow {
    sequence_id: i64,
    stream_type: String,
    stream_id: String,
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
    chain_tag: Vec<u8>,
    timestamp: String,
    quarantined: bool,
    quarantine_reason: Option<String>,
}

impl RawEventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence_id: row.get(0)?,
            stream_type: row.get(1)?,
            stream_id: row.get(2)?,
            ciphertext: row.get(3)?,
            nonce: row.get(4)?,
            chain_tag: row.get(5)?,
            timestamp: row.get(6)?,
            quarantined: row.get(7)?,
            quarantine_reason: row.get(8)?,
        })
    }

    /// Decode the row. Bad column contents yield [`StoredEvent::Malformed`];
    /// only a negative sequence id, which no range can address, is an error.
    fn decode(self) -> Result<StoredEvent, VaultError> {
        let sequence_id = u64::try_from(self.sequence_id).map_err(|_| {
            VaultError::storage(format!("negative sequence id {}", self.sequence_id))
        })?;
        let chain_tag = ChainTag::from_slice(&self.chain_tag);
        let nonce = <[u8; NONCE_LEN]>::try_from(self.nonce.as_slice()).ok();
        let malformed = |detail: &str| {
            warn!(sequence_id, detail, "undecodable event row");
            StoredEvent::Malformed(MalformedEvent {
                sequence_id,
                chain_tag,
                payload: nonce.map(|nonce| SealedPayload {
                    stream_type: self.stream_type.clone(),
                    stream_id: self.stream_id.clone(),
                    ciphertext: self.ciphertext.clone(),
                    nonce,
                }),
                detail: detail.to_string(),
            })
        };

        let Some(nonce) = nonce else {
            return Ok(malformed("nonce length"));
        };
        let Some(chain_tag) = chain_tag else {
            return Ok(malformed("chain tag length"));
        };
        let Some(timestamp) = parse_timestamp(&self.timestamp) else {
            return Ok(malformed("timestamp"));
        };
        let quarantine_reason = match self.quarantine_reason.as_deref() {
            None => None,
            Some(raw) => match QuarantineReason::from_str(raw) {
                Ok(reason) => Some(reason),
                Err(_) => return Ok(malformed("quarantine reason")),
            },
        };

        Ok(StoredEvent::Decoded(EventRecord {
            sequence_id,
            stream_type: self.stream_type,
            stream_id: self.stream_id,
            ciphertext: self.ciphertext,
            nonce,
            chain_tag,
            timestamp,
            quarantined: self.quarantined,
            quarantine_reason,
        }))
    }
}
