// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level XChaCha20-Poly1305 seal/open and randomness.
//!
//! Every call to [`seal`] draws a fresh 192-bit nonce from the system CSPRNG.
//! At that nonce size random generation is safe for the lifetime of a key.
//! All AEAD failures collapse into [`VaultError::Authentication`].

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use vaultlog_core::types::{KEY_LEN, NONCE_LEN};
use vaultlog_core::{Plaintext, VaultError};

/// Poly1305 tag length appended to every ciphertext.
pub const AEAD_TAG_LEN: usize = 16;

/// Encrypt `plaintext` bound to `aad`. Returns `(ciphertext_with_tag, nonce)`.
pub fn seal(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), VaultError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let nonce_bytes: [u8; NONCE_LEN] = random_array()?;
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| VaultError::Internal("XChaCha20-Poly1305 encryption failed".into()))?;
    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate. No plaintext is returned unless the tag verifies.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Plaintext, VaultError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Authentication)
}

/// Fill a fixed-size array from the system CSPRNG.
pub fn random_array<const N: usize>() -> Result<[u8; N], VaultError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| VaultError::Randomness)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = random_array::<KEY_LEN>().unwrap();
        let (ct, nonce) = seal(&key, b"payload", b"ad").unwrap();
        assert_eq!(ct.len(), b"payload".len() + AEAD_TAG_LEN);
        let pt = open(&key, &nonce, &ct, b"ad").unwrap();
        assert_eq!(pt.as_slice(), b"payload");
    }

    #[test]
    fn wrong_aad_is_rejected() {
        let key = random_array::<KEY_LEN>().unwrap();
        let (ct, nonce) = seal(&key, b"payload", b"ad-1").unwrap();
        assert!(matches!(
            open(&key, &nonce, &ct, b"ad-2"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let key = random_array::<KEY_LEN>().unwrap();
        let (ct, nonce) = seal(&key, b"payload", b"").unwrap();
        assert!(matches!(
            open(&key, &nonce, &ct[..AEAD_TAG_LEN - 1], b""),
            Err(VaultError::Authentication)
        ));
    }
}
