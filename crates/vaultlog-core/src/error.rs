// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the vaultlog core.
//!
//! Messages for cryptographic failures are deliberately uniform: a wrong
//! passkey and a corrupted ciphertext both surface as [`VaultError::Authentication`]
//! with the same text, so callers cannot use the error as an oracle.

use thiserror::Error;

use crate::types::{QuarantineReason, VaultState};

/// Wire-level code for the "vault is locked" signal.
pub const VAULT_LOCKED: &str = "VAULT_LOCKED";

/// The error type returned by every vault and store operation.
#[derive(Debug, Error)]
pub enum VaultError {
    /// An operation was attempted while the vault was not `UNLOCKED`.
    ///
    /// Recoverable by unlocking. Boundary layers must present this as a
    /// locked vault, not as a generic failure.
    #[error("vault is locked ({state})")]
    Locked { state: VaultState },

    /// No system key record exists; the vault was never provisioned.
    #[error("vault not provisioned")]
    NotProvisioned,

    /// Provisioning was requested but a system key record already exists.
    #[error("vault already provisioned")]
    AlreadyProvisioned,

    /// The memory-hard hash could not run (resource exhaustion). Retryable.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Wrong passkey, tampered ciphertext, or mismatched associated data.
    #[error("authentication failed")]
    Authentication,

    /// A record failed chain verification and has been quarantined.
    #[error("chain integrity violation at sequence {sequence_id}: {reason}")]
    ChainIntegrity {
        sequence_id: u64,
        reason: QuarantineReason,
    },

    /// A stored event row could not be decoded.
    ///
    /// Reads map this to [`VaultError::ChainIntegrity`] after quarantining
    /// the row.
    #[error("corrupted event row {sequence_id}: {detail}")]
    MalformedEvent { sequence_id: u64, detail: String },

    /// No record exists for the requested sequence id.
    #[error("event not found: {0}")]
    EventNotFound(u64),

    /// No passkey could be obtained from the environment or a terminal.
    #[error("passkey unavailable: {0}")]
    Passkey(String),

    /// The text is not a valid BIP39 mnemonic (unknown word, wrong length,
    /// or bad checksum).
    #[error("recovery phrase is not a valid mnemonic")]
    InvalidRecoveryPhrase,

    /// The key record carries no recovery wrap.
    #[error("no recovery phrase is set for this vault")]
    RecoveryNotEnabled,

    /// A backup file is truncated or not in the expected format.
    #[error("invalid backup: {0}")]
    InvalidBackup(String),

    /// Configuration or persisted parameters deviate from what is allowed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query, corrupted row).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The system random number generator failed.
    #[error("randomness source failed")]
    Randomness,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Wrap any error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Returns `true` for the distinguished locked signal.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// Stable machine-readable code for boundary layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Locked { .. } => VAULT_LOCKED,
            Self::NotProvisioned => "VAULT_NOT_PROVISIONED",
            Self::AlreadyProvisioned => "VAULT_ALREADY_PROVISIONED",
            Self::KeyDerivation(_) => "KEY_DERIVATION",
            Self::Authentication => "AUTHENTICATION",
            Self::ChainIntegrity { .. } => "CHAIN_INTEGRITY",
            Self::MalformedEvent { .. } => "MALFORMED_EVENT",
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::Passkey(_) => "PASSKEY",
            Self::InvalidRecoveryPhrase => "INVALID_RECOVERY_PHRASE",
            Self::RecoveryNotEnabled => "RECOVERY_NOT_ENABLED",
            Self::InvalidBackup(_) => "INVALID_BACKUP",
            Self::Config(_) => "CONFIG",
            Self::Storage { .. } => "STORAGE",
            Self::Randomness => "RANDOMNESS",
            Self::Internal(_) => "INTERNAL",
        }
    }
}
