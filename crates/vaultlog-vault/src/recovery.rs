// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BIP39 recovery phrase: a second way to unwrap the epoch secret.
//!
//! ```text
//! phrase --BIP39 seed("")--> 64-byte seed --Argon2id(RECOVERY)--> recovery KEK
//! recovery KEK --unwrap--> EpochSecret
//! ```
//!
//! The recovery copy sits next to the passkey copy in the key record. Losing
//! the passkey no longer loses the log, as long as the 24 words were kept.

use bip39::{Language, Mnemonic};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use vaultlog_core::types::{KEY_LEN, SALT_LEN};
use vaultlog_core::{KdfParams, RecoveryWrap, VaultError};

use crate::context::VaultContext;
use crate::crypto::random_array;
use crate::keys::EpochSecret;
use crate::kdf;
use crate::wrap::{self, WrapPurpose};

/// Words in a generated phrase (256 bits of entropy).
pub const PHRASE_WORDS: usize = 24;

const ENTROPY_LEN: usize = 32;

/// Generate a fresh English phrase of [`PHRASE_WORDS`] words.
pub fn generate_phrase() -> Result<SecretString, VaultError> {
    let entropy = Zeroizing::new(random_array::<ENTROPY_LEN>()?);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_ref())
        .map_err(|e| VaultError::Internal(format!("mnemonic generation failed: {e}")))?;
    Ok(SecretString::from(mnemonic.to_string()))
}

/// Whether `phrase` is a valid 24-word English mnemonic.
///
/// Case and surrounding whitespace are ignored.
pub fn validate_phrase(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

fn parse(phrase: &str) -> Result<Mnemonic, VaultError> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    );
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|_| VaultError::InvalidRecoveryPhrase)?;
    if mnemonic.word_count() != PHRASE_WORDS {
        return Err(VaultError::InvalidRecoveryPhrase);
    }
    Ok(mnemonic)
}

/// Derive the recovery KEK for `phrase` and `salt`.
pub fn derive_recovery_kek(
    phrase: &SecretString,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let mnemonic = parse(phrase.expose_secret())?;
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
    kdf::derive_kek(seed.as_ref(), salt, &KdfParams::RECOVERY)
}

/// Wrap the live epoch secret under `phrase` with a fresh salt.
///
/// The KEK is derived before the key lock is taken.
pub(crate) fn new_recovery_wrap(
    phrase: &SecretString,
    context: &VaultContext,
    created_at: DateTime<Utc>,
) -> Result<RecoveryWrap, VaultError> {
    let salt = kdf::generate_salt()?;
    let kek = derive_recovery_kek(phrase, &salt)?;
    let (wrapped_epoch_secret, wrap_nonce) = context
        .with_keys(|keys| wrap::wrap_for(WrapPurpose::Recovery, &kek, keys.epoch_secret))?;
    Ok(RecoveryWrap {
        salt,
        wrapped_epoch_secret,
        wrap_nonce,
        kdf_params: KdfParams::RECOVERY,
        created_at,
    })
}

/// Recover the epoch secret from the recovery copy.
///
/// A wrong phrase and a corrupted wrap both fail with
/// [`VaultError::Authentication`]; only a phrase that is not a mnemonic at
/// all is reported as [`VaultError::InvalidRecoveryPhrase`].
pub(crate) fn unwrap_recovery_wrap(
    phrase: &SecretString,
    recovery: &RecoveryWrap,
) -> Result<EpochSecret, VaultError> {
    kdf::check_params(&recovery.kdf_params, &KdfParams::RECOVERY)?;
    let kek = derive_recovery_kek(phrase, &recovery.salt)?;
    wrap::unwrap_for(
        WrapPurpose::Recovery,
        &kek,
        &recovery.wrapped_epoch_secret,
        &recovery.wrap_nonce,
    )
}
