// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for vaultlog.
//!
//! Holds the error taxonomy, the durable record types, and the
//! [`EventStore`] capability trait. The vault crate and every storage
//! backend depend on this crate and on nothing of each other.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{VaultError, VAULT_LOCKED};
pub use traits::EventStore;
pub use types::{
    ChainIssue, ChainTag, EventRecord, IssueKind, KdfParams, MalformedEvent, Plaintext,
    QuarantineReason, RecoveryWrap, SealedPayload, StoredEvent, SystemKeyRecord, VaultState,
    VerificationReport,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_carries_distinguished_code() {
        let err = VaultError::Locked {
            state: VaultState::Panic,
        };
        assert!(err.is_locked());
        assert_eq!(err.code(), VAULT_LOCKED);
        assert_eq!(err.to_string(), "vault is locked (PANIC)");
    }

    #[test]
    fn not_provisioned_is_not_locked() {
        let err = VaultError::NotProvisioned;
        assert!(!err.is_locked());
        assert_ne!(err.code(), VAULT_LOCKED);
    }

    #[test]
    fn authentication_message_is_uniform() {
        // Wrong passkey and tampered data share one variant and one message.
        assert_eq!(VaultError::Authentication.to_string(), "authentication failed");
    }

    #[test]
    fn storage_wraps_any_error() {
        let err = VaultError::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
        assert_eq!(err.code(), "STORAGE");
    }

    #[test]
    fn event_store_is_object_safe() {
        fn _assert_object_safe(_: &dyn EventStore) {}
    }
}
