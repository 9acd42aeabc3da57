// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end vault testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use secrecy::SecretString;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::{ChainTag, EventRecord, EventStore, VaultError};
use vaultlog_storage::{MemoryEventStore, SqliteEventStore};
use vaultlog_vault::Vault;

/// Passkey used by every harness unless overridden.
pub const TEST_PASSKEY: &str = "harness passkey 0123";

enum Backend {
    Sqlite {
        path: PathBuf,
        _dir: tempfile::TempDir,
    },
    Memory(Arc<MemoryEventStore>),
}

/// Builder for [`TestVault`].
pub struct TestVaultBuilder {
    passkey: String,
    config: VaultlogConfig,
    in_memory: bool,
}

impl TestVaultBuilder {
    fn new() -> Self {
        Self {
            passkey: TEST_PASSKEY.to_string(),
            config: VaultlogConfig::default(),
            in_memory: false,
        }
    }

    pub fn with_passkey(mut self, passkey: &str) -> Self {
        self.passkey = passkey.to_string();
        self
    }

    pub fn with_config(mut self, config: VaultlogConfig) -> Self {
        self.config = config;
        self
    }

    /// Use [`MemoryEventStore`] instead of a temporary SQLite file.
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Provision the vault. It comes back `UNLOCKED`.
    pub fn build(mut self) -> Result<TestVault, VaultError> {
        let (backend, store): (Backend, Arc<dyn EventStore>) = if self.in_memory {
            let store = Arc::new(MemoryEventStore::new());
            (Backend::Memory(store.clone()), store)
        } else {
            let dir = tempfile::TempDir::new().map_err(VaultError::storage)?;
            let path = dir.path().join("vaultlog.db");
            self.config.storage.database_path = path.display().to_string();
            let store = Arc::new(SqliteEventStore::from_config(&self.config.storage)?);
            (Backend::Sqlite { path, _dir: dir }, store)
        };

        let passkey = SecretString::from(self.passkey);
        let vault = Vault::provision(store.clone(), &passkey, &self.config)?;
        Ok(TestVault {
            vault: Arc::new(vault),
            store,
            passkey,
            config: self.config,
            backend,
        })
    }
}

/// A provisioned vault plus direct access to its storage.
pub struct TestVault {
    pub vault: Arc<Vault>,
    pub store: Arc<dyn EventStore>,
    pub passkey: SecretString,
    pub config: VaultlogConfig,
    backend: Backend,
}

impl TestVault {
    pub fn builder() -> TestVaultBuilder {
        TestVaultBuilder::new()
    }

    /// A SQLite-backed vault with default settings.
    pub fn new() -> Result<Self, VaultError> {
        Self::builder().build()
    }

    /// Path of the SQLite file, if this harness uses one.
    pub fn database_path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Sqlite { path, .. } => Some(path),
            Backend::Memory(_) => None,
        }
    }

    /// Append `count` events with payloads `"event-1"`, `"event-2"`, ...
    pub fn append_numbered(&self, count: u64) -> Result<Vec<EventRecord>, VaultError> {
        (1..=count)
            .map(|i| {
                self.vault
                    .append_event("audit", "harness", format!("event-{i}").as_bytes())
            })
            .collect()
    }

    /// Unlock with the harness passkey.
    pub fn unlock(&self) -> Result<(), VaultError> {
        self.vault.unlock(&self.passkey)
    }

    /// A second, `LOCKED` vault over the same store, as after a restart.
    pub fn reopen(&self) -> Result<Vault, VaultError> {
        Vault::open(self.store.clone(), &self.config)
    }

    /// Delete a row outright. Returns `false` if it did not exist.
    pub fn delete_row(&self, sequence_id: u64) -> Result<bool, VaultError> {
        match &self.backend {
            Backend::Sqlite { path, .. } => raw_execute(
                path,
                "DELETE FROM events WHERE sequence_id = ?1",
                sequence_id,
            ),
            Backend::Memory(store) => Ok(store.delete(sequence_id).is_some()),
        }
    }

    /// Flip one bit of a stored ciphertext.
    pub fn flip_ciphertext_bit(&self, sequence_id: u64) -> Result<bool, VaultError> {
        self.rewrite(sequence_id, |record| {
            if let Some(byte) = record.ciphertext.first_mut() {
                *byte ^= 0x01;
            }
        })
    }

    /// Replace a stored chain tag.
    pub fn overwrite_chain_tag(&self, sequence_id: u64, tag: ChainTag) -> Result<bool, VaultError> {
        self.rewrite(sequence_id, |record| record.chain_tag = tag)
    }

    /// Cut a stored chain tag short so the row no longer decodes.
    ///
    /// Rows in [`MemoryEventStore`] are typed and cannot be damaged this
    /// way; returns `false` there.
    pub fn truncate_chain_tag(&self, sequence_id: u64) -> Result<bool, VaultError> {
        match &self.backend {
            Backend::Sqlite { path, .. } => raw_execute(
                path,
                "UPDATE events SET chain_tag = substr(chain_tag, 1, 31) WHERE sequence_id = ?1",
                sequence_id,
            ),
            Backend::Memory(_) => Ok(false),
        }
    }

    /// Replace a stored timestamp with text that does not parse.
    pub fn garble_timestamp(&self, sequence_id: u64) -> Result<bool, VaultError> {
        match &self.backend {
            Backend::Sqlite { path, .. } => raw_execute(
                path,
                "UPDATE events SET timestamp = 'yesterday-ish' WHERE sequence_id = ?1",
                sequence_id,
            ),
            Backend::Memory(_) => Ok(false),
        }
    }

    /// Exchange the stored contents of two rows, keeping their sequence ids.
    pub fn swap_rows(&self, a: u64, b: u64) -> Result<(), VaultError> {
        let ra = self.raw(a)?;
        let rb = self.raw(b)?;
        self.rewrite(a, |record| copy_contents(record, &rb))?;
        self.rewrite(b, |record| copy_contents(record, &ra))?;
        Ok(())
    }

    fn raw(&self, sequence_id: u64) -> Result<EventRecord, VaultError> {
        self.store
            .get(sequence_id)?
            .ok_or(VaultError::EventNotFound(sequence_id))?
            .into_record()
    }

    fn rewrite(
        &self,
        sequence_id: u64,
        edit: impl FnOnce(&mut EventRecord),
    ) -> Result<bool, VaultError> {
        match &self.backend {
            Backend::Memory(store) => Ok(store.tamper(sequence_id, edit)),
            Backend::Sqlite { path, .. } => {
                let Some(stored) = self.store.get(sequence_id)? else {
                    return Ok(false);
                };
                let mut record = stored.into_record()?;
                edit(&mut record);
                let conn = raw_connection(path)?;
                let changed = conn
                    .execute(
                        "UPDATE events SET stream_type = ?1, stream_id = ?2, ciphertext = ?3,
                             nonce = ?4, chain_tag = ?5
                         WHERE sequence_id = ?6",
                        params![
                            record.stream_type,
                            record.stream_id,
                            record.ciphertext,
                            &record.nonce[..],
                            &record.chain_tag.as_bytes()[..],
                            to_i64(sequence_id)?,
                        ],
                    )
                    .map_err(VaultError::storage)?;
                Ok(changed > 0)
            }
        }
    }

    /// Read the quarantine columns straight from storage.
    pub fn quarantine_of(&self, sequence_id: u64) -> Result<Option<String>, VaultError> {
        match &self.backend {
            Backend::Memory(store) => Ok(store
                .get(sequence_id)?
                .and_then(|stored| stored.record().and_then(|r| r.quarantine_reason))
                .map(|r| r.to_string())),
            Backend::Sqlite { path, .. } => {
                let conn = raw_connection(path)?;
                let reason: Option<Option<String>> = conn
                    .query_row(
                        "SELECT quarantine_reason FROM events WHERE sequence_id = ?1",
                        params![to_i64(sequence_id)?],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(VaultError::storage)?;
                Ok(reason.flatten())
            }
        }
    }
}

fn copy_contents(dst: &mut EventRecord, src: &EventRecord) {
    dst.stream_type = src.stream_type.clone();
    dst.stream_id = src.stream_id.clone();
    dst.ciphertext = src.ciphertext.clone();
    dst.nonce = src.nonce;
    dst.chain_tag = src.chain_tag;
}

fn to_i64(sequence_id: u64) -> Result<i64, VaultError> {
    i64::try_from(sequence_id).map_err(|e| VaultError::Internal(e.to_string()))
}

fn raw_connection(path: &Path) -> Result<Connection, VaultError> {
    let conn = Connection::open(path).map_err(VaultError::storage)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(VaultError::storage)?;
    Ok(conn)
}

fn raw_execute(path: &Path, sql: &str, sequence_id: u64) -> Result<bool, VaultError> {
    let conn = raw_connection(path)?;
    let changed = conn
        .execute(sql, params![to_i64(sequence_id)?])
        .map_err(VaultError::storage)?;
    tracing::debug!(sequence_id, changed, "raw row edit");
    Ok(changed > 0)
}
