// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The narrow persistence interface the vault depends on.

use std::ops::RangeInclusive;

use crate::error::VaultError;
use crate::types::{EventRecord, QuarantineReason, StoredEvent, SystemKeyRecord};

/// Durable append-only storage for the key record and the event log.
///
/// Implementations treat every payload as opaque bytes. Integrity comes from
/// the chain tags computed by the vault, not from the storage engine, so a
/// backend needs no foreign keys or cascades. Methods are synchronous; a
/// backend may block on I/O but is never called while key material is locked.
pub trait EventStore: Send + Sync {
    /// Load the singleton key record, or `None` if the vault was never provisioned.
    fn load_key_record(&self) -> Result<Option<SystemKeyRecord>, VaultError>;

    /// Insert the key record. Fails with [`VaultError::AlreadyProvisioned`]
    /// if one already exists.
    fn insert_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError>;

    /// Overwrite the existing key record (passkey rotation).
    fn replace_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError>;

    /// Append one event. The write is atomic: ciphertext, nonce and chain tag
    /// land together or not at all. A duplicate `sequence_id` is an error.
    fn append(&self, record: &EventRecord) -> Result<(), VaultError>;

    /// Point read by sequence id.
    ///
    /// A row that exists but cannot be decoded is returned as
    /// [`StoredEvent::Malformed`], not as an error, so one damaged row never
    /// stops reads of its neighbours.
    fn get(&self, sequence_id: u64) -> Result<Option<StoredEvent>, VaultError>;

    /// All rows whose sequence id falls in `range`, ascending.
    fn scan(&self, range: RangeInclusive<u64>) -> Result<Vec<StoredEvent>, VaultError>;

    /// The row with the highest sequence id.
    fn last(&self) -> Result<Option<StoredEvent>, VaultError>;

    /// Set the quarantine flag and reason. Never clears an existing flag.
    fn mark_quarantined(
        &self,
        sequence_id: u64,
        reason: QuarantineReason,
    ) -> Result<(), VaultError>;

    /// Release the underlying handle. Later calls may reopen it.
    fn release(&self) -> Result<(), VaultError>;
}
