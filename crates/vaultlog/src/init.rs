// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog init` command implementation.

use std::process::ExitCode;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;
use vaultlog_vault::{read_new_passkey, Vault};

use crate::session;

/// Provision a vault at the configured database path.
pub fn run_init(config: &VaultlogConfig) -> Result<ExitCode, VaultError> {
    let store = session::open_store(config)?;
    if Vault::is_provisioned(store.as_ref())? {
        return Err(VaultError::AlreadyProvisioned);
    }

    let passkey = read_new_passkey(config.vault.min_passkey_len)?;
    let vault = Vault::provision(store, &passkey, config)?;
    vault.lock();

    println!("vaultlog: vault created at {}", config.storage.database_path);
    Ok(ExitCode::SUCCESS)
}
