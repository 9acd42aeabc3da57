// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog backup` and `vaultlog restore` command implementation.
//!
//! A backup is a consistent SQLite snapshot sealed under a key derived from
//! the passkey, so stream names, timestamps and row counts stay hidden too:
//!
//! ```text
//! MAGIC (8) || salt (16) || nonce (24) || XChaCha20-Poly1305(snapshot)
//! ```
//!
//! The magic and salt are bound as associated data. Restore keeps the
//! database it replaces at `<db>.pre-restore`. Stop any `vaultlog watch`
//! process on the same database before restoring.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::types::{NONCE_LEN, SALT_LEN};
use vaultlog_core::{KdfParams, VaultError};
use vaultlog_storage::snapshot;
use vaultlog_vault::crypto::{self, AEAD_TAG_LEN};
use vaultlog_vault::{kdf, read_passkey};

use crate::session;

const MAGIC: &[u8; 8] = b"VLTBAK\x00\x01";
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;

/// `path` with `suffix` appended to its file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Remove a scratch database and the WAL sidecars SQLite may leave with it.
fn remove_scratch(path: &Path) {
    for file in [path.to_path_buf(), with_suffix(path, "-wal"), with_suffix(path, "-shm")] {
        if let Err(e) = fs::remove_file(&file)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %file.display(), error = %e, "could not remove scratch file");
        }
    }
}

fn header_aad(salt: &[u8; SALT_LEN]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(MAGIC.len() + SALT_LEN);
    aad.extend_from_slice(MAGIC);
    aad.extend_from_slice(salt);
    aad
}

/// Write an encrypted snapshot of `db_path` to `out`. Returns the file size.
///
/// `out` only appears once it is complete.
pub fn create_backup(db_path: &Path, out: &Path, passkey: &SecretString) -> Result<u64, VaultError> {
    let staging = with_suffix(out, ".snapshot");
    let copied = snapshot::copy_database(db_path, &staging)
        .and_then(|()| fs::read(&staging).map_err(VaultError::storage));
    remove_scratch(&staging);
    let image = copied?;

    let salt = kdf::generate_salt()?;
    let kek = kdf::derive_kek(passkey.expose_secret().as_bytes(), &salt, &KdfParams::LOCKED)?;
    let (ciphertext, nonce) = crypto::seal(&kek, &image, &header_aad(&salt))?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.extend_from_slice(MAGIC);
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    let partial = with_suffix(out, ".partial");
    fs::write(&partial, &sealed).map_err(VaultError::storage)?;
    fs::rename(&partial, out).map_err(VaultError::storage)?;
    info!(out = %out.display(), bytes = sealed.len(), "backup written");
    Ok(sealed.len() as u64)
}

/// Decrypt the backup at `from` and copy it over `db_path`.
///
/// A wrong passkey and a tampered file both fail with
/// [`VaultError::Authentication`] before anything on disk changes. Returns
/// where the replaced database was kept, if there was one.
pub fn restore_backup(
    db_path: &Path,
    from: &Path,
    passkey: &SecretString,
) -> Result<Option<PathBuf>, VaultError> {
    let sealed = fs::read(from).map_err(VaultError::storage)?;
    if sealed.len() < HEADER_LEN + AEAD_TAG_LEN || !sealed.starts_with(MAGIC) {
        return Err(VaultError::InvalidBackup("not a vaultlog backup file".into()));
    }
    let (header, ciphertext) = sealed.split_at(HEADER_LEN);
    let salt: [u8; SALT_LEN] = header[MAGIC.len()..MAGIC.len() + SALT_LEN]
        .try_into()
        .map_err(|_| VaultError::InvalidBackup("truncated header".into()))?;
    let nonce: [u8; NONCE_LEN] = header[MAGIC.len() + SALT_LEN..]
        .try_into()
        .map_err(|_| VaultError::InvalidBackup("truncated header".into()))?;

    let kek = kdf::derive_kek(passkey.expose_secret().as_bytes(), &salt, &KdfParams::LOCKED)?;
    let image = crypto::open(&kek, &nonce, ciphertext, &header_aad(&salt))?;

    let staging = with_suffix(db_path, ".restore");
    let restored = fs::write(&staging, image.as_slice())
        .map_err(VaultError::storage)
        .and_then(|()| snapshot::check_snapshot(&staging))
        .and_then(|()| {
            let kept = if db_path.exists() {
                let kept = with_suffix(db_path, ".pre-restore");
                snapshot::copy_database(db_path, &kept)?;
                Some(kept)
            } else {
                None
            };
            snapshot::copy_database(&staging, db_path)?;
            Ok(kept)
        });
    remove_scratch(&staging);
    let kept = restored?;
    info!(from = %from.display(), to = %db_path.display(), "backup restored");
    Ok(kept)
}

/// Run `vaultlog backup`. The passkey must unlock the vault.
pub fn run_backup(config: &VaultlogConfig, out: &Path) -> Result<ExitCode, VaultError> {
    let vault = session::open_vault(config)?;
    let passkey = read_passkey()?;
    vault.unlock(&passkey)?;
    vault.lock();

    let bytes = create_backup(Path::new(&config.storage.database_path), out, &passkey)?;
    let size_mb = bytes as f64 / (1024.0 * 1024.0);
    eprintln!("Backup complete: {size_mb:.1} MB written to {}", out.display());
    Ok(ExitCode::SUCCESS)
}

/// Run `vaultlog restore`, then prove the restored vault unlocks.
pub fn run_restore(config: &VaultlogConfig, from: &Path) -> Result<ExitCode, VaultError> {
    let passkey = read_passkey()?;
    let db_path = Path::new(&config.storage.database_path);
    let kept = restore_backup(db_path, from, &passkey)?;
    if let Some(kept) = &kept {
        eprintln!("Previous database kept at {}", kept.display());
    }

    let vault = session::open_vault(config)?;
    vault.unlock(&passkey)?;
    vault.lock();
    println!("vaultlog: restored {} from {}", db_path.display(), from.display());
    Ok(ExitCode::SUCCESS)
}
