// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passkey and recovery-phrase acquisition via TTY prompt or environment
//! variables.

use secrecy::{ExposeSecret, SecretString};

use vaultlog_core::VaultError;

/// The environment variable name for providing the passkey.
pub const PASSKEY_ENV_VAR: &str = "VAULTLOG_PASSKEY";

/// The replacement passkey during a headless rotation.
pub const NEW_PASSKEY_ENV_VAR: &str = "VAULTLOG_NEW_PASSKEY";

/// The recovery phrase for a headless `recover`.
pub const RECOVERY_PHRASE_ENV_VAR: &str = "VAULTLOG_RECOVERY_PHRASE";

fn from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn prompt(label: &str) -> Result<SecretString, VaultError> {
    eprint!("{label}: ");
    rpassword::read_password()
        .map(SecretString::from)
        .map_err(|e| VaultError::Passkey(format!("failed to read passkey: {e}")))
}

fn stdin_is_terminal() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdin())
}

fn unavailable(var: &str) -> VaultError {
    VaultError::Passkey(format!(
        "no passkey provided; set {var} or run interactively"
    ))
}

/// Get the passkey to unlock an existing vault.
///
/// Priority:
/// 1. `VAULTLOG_PASSKEY` environment variable (for headless use)
/// 2. Interactive TTY prompt via `rpassword`
pub fn read_passkey() -> Result<SecretString, VaultError> {
    if let Some(key) = from_env(PASSKEY_ENV_VAR) {
        return Ok(key);
    }
    if stdin_is_terminal() {
        let key = prompt("Vault passkey")?;
        if key.expose_secret().is_empty() {
            return Err(VaultError::Passkey("empty passkey not allowed".into()));
        }
        return Ok(key);
    }
    Err(unavailable(PASSKEY_ENV_VAR))
}

/// Get the recovery phrase from `VAULTLOG_RECOVERY_PHRASE` or the terminal.
pub fn read_recovery_phrase() -> Result<SecretString, VaultError> {
    if let Some(phrase) = from_env(RECOVERY_PHRASE_ENV_VAR) {
        return Ok(phrase);
    }
    if stdin_is_terminal() {
        return prompt("Recovery phrase");
    }
    Err(VaultError::Passkey(format!(
        "no recovery phrase provided; set {RECOVERY_PHRASE_ENV_VAR} or run interactively"
    )))
}

/// Get the passkey for a new vault, enforcing `min_len` characters.
///
/// Interactive input is asked for twice and must match.
pub fn read_new_passkey(min_len: usize) -> Result<SecretString, VaultError> {
    new_passkey_from(PASSKEY_ENV_VAR, min_len)
}

/// Get the replacement passkey for a rotation, from
/// `VAULTLOG_NEW_PASSKEY` or the terminal.
pub fn read_replacement_passkey(min_len: usize) -> Result<SecretString, VaultError> {
    new_passkey_from(NEW_PASSKEY_ENV_VAR, min_len)
}

fn new_passkey_from(var: &str, min_len: usize) -> Result<SecretString, VaultError> {
    let key = match from_env(var) {
        Some(key) => key,
        None if stdin_is_terminal() => {
            let first = prompt("New vault passkey")?;
            let second = prompt("Confirm vault passkey")?;
            if first.expose_secret() != second.expose_secret() {
                return Err(VaultError::Passkey("passkeys do not match".into()));
            }
            first
        }
        None => return Err(unavailable(var)),
    };
    check_length(&key, min_len)?;
    Ok(key)
}

/// Reject passkeys shorter than `min_len` characters.
pub fn check_length(key: &SecretString, min_len: usize) -> Result<(), VaultError> {
    let len = key.expose_secret().chars().count();
    if len < min_len {
        return Err(VaultError::Passkey(format!(
            "passkey must be at least {min_len} characters"
        )));
    }
    Ok(())
}
