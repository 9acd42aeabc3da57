// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key types held by the vault context.
//!
//! ```text
//! passkey --Argon2id--> KEK --unwrap--> EpochSecret
//! EpochSecret --HKDF-SHA256("vaultlog data key v1")--> DataKey
//! EpochSecret --HKDF-SHA256("vaultlog chain key v1")--> ChainKey
//! ```
//!
//! None of these types are `Clone`. All are zeroed on drop and print as
//! `[REDACTED]`.

use std::fmt;

use ring::hkdf;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vaultlog_core::types::KEY_LEN;
use vaultlog_core::VaultError;

use crate::crypto::random_array;

const DATA_KEY_INFO: &[u8] = b"vaultlog data key v1";
const CHAIN_KEY_INFO: &[u8] = b"vaultlog chain key v1";

macro_rules! secret_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; KEY_LEN]);

        impl $name {
            pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "([REDACTED])"))
            }
        }
    };
}

secret_key!(
    /// The root of the working-key hierarchy. Only ever persisted wrapped.
    EpochSecret
);
secret_key!(
    /// Encrypts event payloads.
    DataKey
);
secret_key!(
    /// Keys the HMAC chain over event plaintexts.
    ChainKey
);

impl EpochSecret {
    /// A fresh random secret for provisioning.
    pub fn generate() -> Result<Self, VaultError> {
        random_array().map(Self)
    }

    /// Copy a secret out of a decrypted buffer. `None` unless exactly
    /// [`KEY_LEN`] bytes long.
    ///
    /// The bytes go straight into the zeroize-on-drop value; no intermediate
    /// copy is left behind.
    pub(crate) fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut secret = Self([0u8; KEY_LEN]);
        secret.0.copy_from_slice(bytes);
        Some(secret)
    }

    /// Derive the data and chain keys.
    pub fn derive_working_keys(&self) -> Result<(DataKey, ChainKey), VaultError> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]).extract(&self.0);
        let data = expand(&prk, DATA_KEY_INFO)?;
        let chain = expand(&prk, CHAIN_KEY_INFO)?;
        Ok((DataKey(data), ChainKey(chain)))
    }
}

fn expand(prk: &hkdf::Prk, info: &[u8]) -> Result<[u8; KEY_LEN], VaultError> {
    let info = [info];
    let okm = prk
        .expand(&info, hkdf::HKDF_SHA256)
        .map_err(|_| VaultError::Internal("HKDF expand failed".into()))?;
    let mut out = [0u8; KEY_LEN];
    okm.fill(&mut out)
        .map_err(|_| VaultError::Internal("HKDF fill failed".into()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_keys_are_distinct_and_deterministic() {
        let secret = EpochSecret::from_slice(&[7u8; KEY_LEN]).unwrap();
        let (d1, c1) = secret.derive_working_keys().unwrap();
        let (d2, c2) = secret.derive_working_keys().unwrap();
        assert_eq!(d1.as_bytes(), d2.as_bytes());
        assert_eq!(c1.as_bytes(), c2.as_bytes());
        assert_ne!(d1.as_bytes(), c1.as_bytes());
        assert_ne!(d1.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn debug_is_redacted() {
        let secret = EpochSecret::from_slice(&[0xAA; KEY_LEN]).unwrap();
        let shown = format!("{secret:?}");
        assert_eq!(shown, "EpochSecret([REDACTED])");
        assert!(!shown.contains("170"));
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert!(EpochSecret::from_slice(&[1u8; KEY_LEN - 1]).is_none());
        assert!(EpochSecret::from_slice(&[1u8; KEY_LEN + 1]).is_none());
        let secret = EpochSecret::from_slice(&[1u8; KEY_LEN]).unwrap();
        assert_eq!(secret.as_bytes(), &[1u8; KEY_LEN]);
    }

    #[test]
    fn generated_secrets_differ() {
        let a = EpochSecret::generate().unwrap();
        let b = EpochSecret::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
