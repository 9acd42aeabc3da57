// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;

use secrecy::SecretString;
use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::{EventRecord, EventStore};
use vaultlog_storage::{MemoryEventStore, SqliteEventStore};
use vaultlog_vault::Vault;

pub const PASSKEY: &str = "correct horse battery";

pub fn passkey(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

pub fn memory_vault() -> (Arc<MemoryEventStore>, Arc<Vault>) {
    let store = Arc::new(MemoryEventStore::new());
    let vault = Vault::provision(store.clone(), &passkey(PASSKEY), &VaultlogConfig::default())
        .expect("provision");
    (store, Arc::new(vault))
}

pub fn sqlite_vault(dir: &tempfile::TempDir) -> (Arc<SqliteEventStore>, Arc<Vault>) {
    let mut config = VaultlogConfig::default();
    config.storage.database_path = dir.path().join("vault.db").display().to_string();
    let store = Arc::new(SqliteEventStore::from_config(&config.storage).expect("open store"));
    let vault = Vault::provision(store.clone(), &passkey(PASSKEY), &config).expect("provision");
    (store, Arc::new(vault))
}

/// Append `"event-1"` through `"event-{count}"`.
pub fn append_numbered(vault: &Vault, count: u64) {
    for i in 1..=count {
        vault
            .append_event("audit", "stream-a", format!("event-{i}").as_bytes())
            .expect("append");
    }
}

pub fn reopen(store: Arc<dyn EventStore>) -> Vault {
    Vault::open(store, &VaultlogConfig::default()).expect("open")
}

/// The decoded record at `sequence_id`; panics if missing or undecodable.
pub fn record(store: &dyn EventStore, sequence_id: u64) -> EventRecord {
    store
        .get(sequence_id)
        .expect("get")
        .expect("present")
        .into_record()
        .expect("decodable")
}
