// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening the configured store and vault.

use std::path::Path;
use std::sync::Arc;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;
use vaultlog_storage::SqliteEventStore;
use vaultlog_vault::{read_passkey, Vault};

/// Open the SQLite store, creating the file if needed.
pub fn open_store(config: &VaultlogConfig) -> Result<Arc<SqliteEventStore>, VaultError> {
    SqliteEventStore::from_config(&config.storage).map(Arc::new)
}

/// Open an existing vault in the `LOCKED` state.
///
/// A missing database file is reported as [`VaultError::NotProvisioned`]
/// without creating it.
pub fn open_vault(config: &VaultlogConfig) -> Result<Arc<Vault>, VaultError> {
    if !Path::new(&config.storage.database_path).exists() {
        return Err(VaultError::NotProvisioned);
    }
    let store = open_store(config)?;
    Ok(Arc::new(Vault::open(store, config)?))
}

/// Open the vault and unlock it with the passkey from the environment or a prompt.
pub fn unlocked_vault(config: &VaultlogConfig) -> Result<Arc<Vault>, VaultError> {
    let vault = open_vault(config)?;
    let passkey = read_passkey()?;
    vault.unlock(&passkey)?;
    Ok(vault)
}
