// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog recovery` and `vaultlog recover` command implementation.
//!
//! `recovery` unlocks with the passkey and prints a fresh 24-word phrase
//! that can unwrap the vault key on its own. `recover` takes that phrase
//! (`VAULTLOG_RECOVERY_PHRASE` or prompt) and sets a new passkey
//! (`VAULTLOG_NEW_PASSKEY` or prompt).

use std::process::ExitCode;

use secrecy::ExposeSecret;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;
use vaultlog_vault::{read_recovery_phrase, read_replacement_passkey};

use crate::session;

pub fn run_recovery(config: &VaultlogConfig) -> Result<ExitCode, VaultError> {
    let vault = session::unlocked_vault(config)?;
    let phrase = vault.enable_recovery();
    vault.lock();
    let phrase = phrase?;

    eprintln!("Write these words down and keep them offline. They are shown only once.");
    eprintln!("Any earlier recovery phrase for this vault no longer works.");
    println!("{}", phrase.expose_secret());
    Ok(ExitCode::SUCCESS)
}

pub fn run_recover(config: &VaultlogConfig) -> Result<ExitCode, VaultError> {
    let vault = session::open_vault(config)?;
    let phrase = read_recovery_phrase()?;
    vault.unlock_with_recovery(&phrase)?;
    let result = read_replacement_passkey(config.vault.min_passkey_len)
        .and_then(|new_passkey| vault.change_passkey(&new_passkey));
    vault.lock();
    result?;

    println!("vaultlog: passkey reset from recovery phrase");
    Ok(ExitCode::SUCCESS)
}
