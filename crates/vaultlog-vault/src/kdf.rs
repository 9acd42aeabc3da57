// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from a passkey.
//!
//! Derives the 32-byte key-encryption key (KEK) with Argon2id v0x13. The
//! passkey wrap uses [`KdfParams::LOCKED`] and the recovery wrap
//! [`KdfParams::RECOVERY`]. Parameters are never negotiated: anything else is
//! a configuration error. Working memory is reserved fallibly so exhaustion
//! surfaces as [`VaultError::KeyDerivation`] instead of an abort.

use argon2::{Algorithm, Argon2, Block, Params, Version};
use zeroize::Zeroizing;

use vaultlog_core::types::{KEY_LEN, SALT_LEN};
use vaultlog_core::{KdfParams, VaultError};

use crate::crypto::random_array;

/// Reject any parameter set other than `expected`.
pub fn check_params(params: &KdfParams, expected: &KdfParams) -> Result<(), VaultError> {
    if params == expected {
        Ok(())
    } else {
        Err(VaultError::Config(format!(
            "unsupported KDF parameters {params}, expected {expected}"
        )))
    }
}

/// Derive the KEK from `passkey` and `salt` under one of the two fixed
/// profiles.
pub fn derive_kek(
    passkey: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    if *params != KdfParams::RECOVERY {
        check_params(params, &KdfParams::LOCKED)?;
    }

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::Config(format!("invalid Argon2id parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let block_count = argon2.params().block_count();
    let mut blocks: Zeroizing<Vec<Block>> = Zeroizing::new(Vec::new());
    blocks.try_reserve_exact(block_count).map_err(|_| {
        VaultError::KeyDerivation(format!(
            "could not reserve {} KiB of working memory",
            params.memory_kib
        ))
    })?;
    blocks.resize(block_count, Block::default());

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into_with_memory(passkey, salt, output.as_mut(), blocks.as_mut_slice())
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

    Ok(output)
}

/// Generate a random salt for a new key record.
pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultError> {
    random_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_kek_is_deterministic() {
        let salt = [1u8; SALT_LEN];
        let k1 = derive_kek(b"correct horse battery", &salt, &KdfParams::LOCKED).unwrap();
        let k2 = derive_kek(b"correct horse battery", &salt, &KdfParams::LOCKED).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn passkey_and_salt_both_matter() {
        let a = derive_kek(b"passkey one", &[2u8; SALT_LEN], &KdfParams::LOCKED).unwrap();
        let b = derive_kek(b"passkey two", &[2u8; SALT_LEN], &KdfParams::LOCKED).unwrap();
        let c = derive_kek(b"passkey one", &[3u8; SALT_LEN], &KdfParams::LOCKED).unwrap();
        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn weaker_params_are_a_config_error() {
        let weak = KdfParams {
            memory_kib: 4096,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            derive_kek(b"passkey", &[0u8; SALT_LEN], &weak),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn stronger_params_are_also_rejected() {
        let strong = KdfParams {
            memory_kib: 64 * 1024,
            ..KdfParams::LOCKED
        };
        assert!(check_params(&strong, &KdfParams::LOCKED).is_err());
        assert!(check_params(&KdfParams::RECOVERY, &KdfParams::LOCKED).is_err());
    }

    #[test]
    fn generate_salt_produces_random_values() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }
}
