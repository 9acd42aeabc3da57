// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-event authenticated encryption under the data key.
//!
//! Each payload is bound to its position in the log through associated data:
//!
//! ```text
//! u32 BE len(stream_type) || stream_type || u32 BE len(stream_id) || stream_id || u64 BE sequence_id
//! ```
//!
//! Moving a ciphertext to another stream or sequence id makes it fail
//! authentication.

use vaultlog_core::types::NONCE_LEN;
use vaultlog_core::{Plaintext, VaultError};

use crate::crypto;
use crate::keys::DataKey;

/// Encode the associated data for one event.
pub fn event_aad(stream_type: &str, stream_id: &str, sequence_id: u64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(16 + stream_type.len() + stream_id.len());
    push_prefixed(&mut aad, stream_type.as_bytes());
    push_prefixed(&mut aad, stream_id.as_bytes());
    aad.extend_from_slice(&sequence_id.to_be_bytes());
    aad
}

fn push_prefixed(buf: &mut Vec<u8>, field: &[u8]) {
    // Stream names longer than u32::MAX bytes are not representable on disk anyway.
    let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(field);
}

/// Encrypt one event payload. Returns `(ciphertext_with_tag, nonce)`.
pub fn encrypt(
    key: &DataKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), VaultError> {
    crypto::seal(key.as_bytes(), plaintext, aad)
}

/// Decrypt one event payload, failing with [`VaultError::Authentication`]
/// on any mismatch.
pub fn decrypt(
    key: &DataKey,
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
) -> Result<Plaintext, VaultError> {
    crypto::open(key.as_bytes(), nonce, ciphertext, aad)
}
