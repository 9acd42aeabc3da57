// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog rekey` command implementation.
//!
//! Unlocks with the current passkey (`VAULTLOG_PASSKEY` or prompt) and
//! re-wraps the vault key under a new one (`VAULTLOG_NEW_PASSKEY` or prompt).
//! Events are not re-encrypted.

use std::process::ExitCode;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;
use vaultlog_vault::read_replacement_passkey;

use crate::session;

pub fn run_rekey(config: &VaultlogConfig) -> Result<ExitCode, VaultError> {
    let vault = session::unlocked_vault(config)?;
    let result = read_replacement_passkey(config.vault.min_passkey_len)
        .and_then(|new_passkey| vault.change_passkey(&new_passkey));
    vault.lock();
    result?;

    println!("vaultlog: passkey changed");
    Ok(ExitCode::SUCCESS)
}
