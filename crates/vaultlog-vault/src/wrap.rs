// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wrapping of the epoch secret under a passkey- or recovery-derived KEK.

use vaultlog_core::types::{KEY_LEN, NONCE_LEN};
use vaultlog_core::VaultError;

use crate::crypto;
use crate::keys::EpochSecret;

/// Which key protects a wrapped copy of the epoch secret.
///
/// Each purpose has its own associated data, so a blob wrapped for one can
/// never be opened as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPurpose {
    Passkey,
    Recovery,
}

impl WrapPurpose {
    fn aad(self) -> &'static [u8] {
        match self {
            Self::Passkey => b"vaultlog/epoch-secret/v1",
            Self::Recovery => b"vaultlog/epoch-secret/recovery/v1",
        }
    }
}

/// Encrypt the epoch secret for the passkey wrap. Returns
/// `(ciphertext_with_tag, nonce)`.
pub fn wrap(
    kek: &[u8; KEY_LEN],
    secret: &EpochSecret,
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), VaultError> {
    wrap_for(WrapPurpose::Passkey, kek, secret)
}

pub fn wrap_for(
    purpose: WrapPurpose,
    kek: &[u8; KEY_LEN],
    secret: &EpochSecret,
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), VaultError> {
    crypto::seal(kek, secret.as_bytes(), purpose.aad())
}

/// Recover the epoch secret.
///
/// A wrong KEK, a flipped bit, and a blob of the wrong length all fail with
/// the same [`VaultError::Authentication`].
pub fn unwrap(
    kek: &[u8; KEY_LEN],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<EpochSecret, VaultError> {
    unwrap_for(WrapPurpose::Passkey, kek, ciphertext, nonce)
}

pub fn unwrap_for(
    purpose: WrapPurpose,
    kek: &[u8; KEY_LEN],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<EpochSecret, VaultError> {
    let plaintext = crypto::open(kek, nonce, ciphertext, purpose.aad())?;
    EpochSecret::from_slice(&plaintext).ok_or(VaultError::Authentication)
}
