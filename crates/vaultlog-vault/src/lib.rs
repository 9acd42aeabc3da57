// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key hierarchy, encrypted hash-chained event log, and kill switch.
//!
//! A passkey unlocks a random epoch secret via Argon2id and XChaCha20-Poly1305
//! key wrapping. HKDF splits the epoch secret into a data key, which encrypts
//! each event, and a chain key, which links each event to its predecessor
//! with HMAC-SHA256. A BIP39 recovery phrase can hold a second wrapped copy
//! of the epoch secret. [`Vault`] ties these to an [`EventStore`] backend.
//!
//! [`EventStore`]: vaultlog_core::EventStore

pub mod chain;
pub mod cipher;
pub mod context;
pub mod crypto;
pub mod decoy;
pub mod kdf;
pub mod keys;
pub mod kill_switch;
pub mod prompt;
pub mod recovery;
pub mod vault;
pub mod verifier;
pub mod wrap;

pub use chain::{ChainAnchor, ChainVerifier};
pub use context::{ChainHead, VaultContext};
pub use decoy::DecoyWriter;
pub use kill_switch::{KillOutcome, KillSwitch, SecretHolder};
pub use prompt::{
    read_new_passkey, read_passkey, read_recovery_phrase, read_replacement_passkey,
    NEW_PASSKEY_ENV_VAR, PASSKEY_ENV_VAR, RECOVERY_PHRASE_ENV_VAR,
};
pub use vault::Vault;
pub use verifier::{Checkpoint, IncrementalVerifier};
