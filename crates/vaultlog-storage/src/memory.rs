// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`EventStore`] for tests and ephemeral use.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use vaultlog_core::{
    EventRecord, EventStore, QuarantineReason, StoredEvent, SystemKeyRecord, VaultError,
};

#[derive(Default)]
struct Inner {
    key_record: Option<SystemKeyRecord>,
    events: BTreeMap<u64, EventRecord>,
}

/// A `BTreeMap`-backed event store.
///
/// Besides the trait operations it offers raw access ([`tamper`](Self::tamper),
/// [`delete`](Self::delete)) that bypasses the vault, the way an attacker with
/// disk access would.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: RwLock<Inner>,
    releases: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate a stored record in place. Returns `false` if it does not exist.
    pub fn tamper(&self, sequence_id: u64, f: impl FnOnce(&mut EventRecord)) -> bool {
        match self.inner.write().events.get_mut(&sequence_id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// Remove a record outright.
    pub fn delete(&self, sequence_id: u64) -> Option<EventRecord> {
        self.inner.write().events.remove(&sequence_id)
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times [`EventStore::release`] was called.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl EventStore for MemoryEventStore {
    fn load_key_record(&self) -> Result<Option<SystemKeyRecord>, VaultError> {
        Ok(self.inner.read().key_record.clone())
    }

    fn insert_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError> {
        let mut inner = self.inner.write();
        if inner.key_record.is_some() {
            return Err(VaultError::AlreadyProvisioned);
        }
        inner.key_record = Some(record.clone());
        Ok(())
    }

    fn replace_key_record(&self, record: &SystemKeyRecord) -> Result<(), VaultError> {
        let mut inner = self.inner.write();
        match inner.key_record.as_mut() {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(VaultError::NotProvisioned),
        }
    }

    fn append(&self, record: &EventRecord) -> Result<(), VaultError> {
        let mut inner = self.inner.write();
        if inner.events.contains_key(&record.sequence_id) {
            return Err(VaultError::storage(format!(
                "duplicate sequence id {}",
                record.sequence_id
            )));
        }
        inner.events.insert(record.sequence_id, record.clone());
        Ok(())
    }

    fn get(&self, sequence_id: u64) -> Result<Option<StoredEvent>, VaultError> {
        Ok(self
            .inner
            .read()
            .events
            .get(&sequence_id)
            .cloned()
            .map(StoredEvent::Decoded))
    }

    fn scan(&self, range: RangeInclusive<u64>) -> Result<Vec<StoredEvent>, VaultError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .inner
            .read()
            .events
            .range(range)
            .map(|(_, r)| StoredEvent::Decoded(r.clone()))
            .collect())
    }

    fn last(&self) -> Result<Option<StoredEvent>, VaultError> {
        Ok(self
            .inner
            .read()
            .events
            .last_key_value()
            .map(|(_, r)| StoredEvent::Decoded(r.clone())))
    }

    fn mark_quarantined(
        &self,
        sequence_id: u64,
        reason: QuarantineReason,
    ) -> Result<(), VaultError> {
        let mut inner = self.inner.write();
        let record = inner
            .events
            .get_mut(&sequence_id)
            .ok_or(VaultError::EventNotFound(sequence_id))?;
        record.quarantined = true;
        record.quarantine_reason.get_or_insert(reason);
        Ok(())
    }

    fn release(&self) -> Result<(), VaultError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vaultlog_core::ChainTag;

    fn event(seq: u64) -> EventRecord {
        EventRecord {
            sequence_id: seq,
            stream_type: "audit".into(),
            stream_id: "s".into(),
            ciphertext: vec![0xAB; 20],
            nonce: [0u8; 24],
            chain_tag: ChainTag::GENESIS,
            timestamp: Utc::now(),
            quarantined: false,
            quarantine_reason: None,
        }
    }

    #[test]
    fn scan_is_ordered_and_bounded() {
        let store = MemoryEventStore::new();
        for seq in [3, 1, 2, 5] {
            store.append(&event(seq)).unwrap();
        }
        let ids: Vec<u64> = store.scan(2..=5).unwrap().iter().map(|r| r.sequence_id()).collect();
        assert_eq!(ids, vec![2, 3, 5]);
        assert_eq!(store.last().unwrap().unwrap().sequence_id(), 5);
    }

    #[test]
    fn tamper_and_delete_bypass_the_trait() {
        let store = MemoryEventStore::new();
        store.append(&event(1)).unwrap();
        store.append(&event(2)).unwrap();
        assert!(store.tamper(1, |r| r.ciphertext[0] ^= 0xFF));
        let tampered = store.get(1).unwrap().unwrap().into_record().unwrap();
        assert_eq!(tampered.ciphertext[0], 0x54);
        assert!(!store.tamper(9, |_| {}));
        assert!(store.delete(2).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn quarantine_never_clears_or_overwrites() {
        let store = MemoryEventStore::new();
        store.append(&event(1)).unwrap();
        store.mark_quarantined(1, QuarantineReason::ChainBreak).unwrap();
        store
            .mark_quarantined(1, QuarantineReason::DeletionSuspected)
            .unwrap();
        let r = store.get(1).unwrap().unwrap().into_record().unwrap();
        assert!(r.quarantined);
        assert_eq!(r.quarantine_reason, Some(QuarantineReason::ChainBreak));
    }

    #[test]
    fn release_is_counted() {
        let store = MemoryEventStore::new();
        store.release().unwrap();
        store.release().unwrap();
        assert_eq!(store.release_count(), 2);
    }
}
