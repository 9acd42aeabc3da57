// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault lifecycle: provision, unlock, append, read, verify, rotate, panic.
//!
//! The vault uses a key-wrapping pattern:
//! - A random epoch secret roots the working keys (data key, chain key).
//! - The epoch secret itself is encrypted with a key derived from the user's
//!   passkey via Argon2id and stored in the singleton key record.
//! - Changing the passkey only re-wraps the epoch secret; events are never
//!   re-encrypted and chain tags never change.
//!
//! Appends are serialized by a sequencing mutex held across
//! "encrypt and tag, persist, advance head", so no two events chain from the
//! same predecessor. The key lock is never held across storage calls.
//!
//! Unlock and key-record rewrites are serialized by a separate mutex, so
//! Argon2id never runs under the sequencing mutex and a panic is never
//! queued behind a key derivation.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::{
    EventRecord, EventStore, Plaintext, QuarantineReason, StoredEvent, SystemKeyRecord,
    VaultError, VaultState, VerificationReport,
};

use crate::chain::{self, ChainAnchor, ChainVerifier};
use crate::cipher;
use crate::context::{self, new_key_record, ChainHead, VaultContext};
use crate::keys::EpochSecret;
use crate::kill_switch::{KillOutcome, KillSwitch, SecretHolder};
use crate::{kdf, recovery, wrap};

/// An encrypted, hash-chained event log bound to one store.
///
/// Debug output omits all key material.
pub struct Vault {
    store: Arc<dyn EventStore>,
    context: Arc<VaultContext>,
    kill_switch: KillSwitch,
    append_lock: Mutex<()>,
    key_record_lock: Mutex<()>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("state", &self.state())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl Vault {
    fn new(store: Arc<dyn EventStore>, config: &VaultlogConfig) -> Self {
        let context = Arc::new(VaultContext::new());
        let kill_switch = KillSwitch::new(
            Arc::clone(&context),
            Duration::from_millis(config.kill_switch.budget_ms),
        );
        Self {
            store,
            context,
            kill_switch,
            append_lock: Mutex::new(()),
            key_record_lock: Mutex::new(()),
        }
    }

    /// Create the key record and return an `UNLOCKED` vault.
    pub fn provision(
        store: Arc<dyn EventStore>,
        passkey: &SecretString,
        config: &VaultlogConfig,
    ) -> Result<Self, VaultError> {
        if store.load_key_record()?.is_some() {
            return Err(VaultError::AlreadyProvisioned);
        }
        if store.last()?.is_some() {
            return Err(VaultError::Config(
                "event log present without a key record".into(),
            ));
        }

        let epoch_secret = EpochSecret::generate()?;
        let record = new_key_record(passkey.expose_secret().as_bytes(), &epoch_secret, Utc::now())?;
        store.insert_key_record(&record)?;

        let vault = Self::new(store, config);
        let generation = vault.context.generation();
        vault
            .context
            .install(epoch_secret, ChainHead::EMPTY, generation)?;
        info!("vault provisioned");
        Ok(vault)
    }

    /// Open an existing vault in the `LOCKED` state.
    pub fn open(store: Arc<dyn EventStore>, config: &VaultlogConfig) -> Result<Self, VaultError> {
        if store.load_key_record()?.is_none() {
            return Err(VaultError::NotProvisioned);
        }
        debug!("vault opened");
        Ok(Self::new(store, config))
    }

    /// Whether `store` holds a key record.
    pub fn is_provisioned(store: &dyn EventStore) -> Result<bool, VaultError> {
        Ok(store.load_key_record()?.is_some())
    }

    pub fn state(&self) -> VaultState {
        self.context.state()
    }

    /// Fail with [`VaultError::Locked`] unless `UNLOCKED`.
    pub fn ensure_unlocked(&self) -> Result<(), VaultError> {
        self.context.ensure_unlocked()
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// Register a cache of secret-derived state to be wiped on panic.
    pub fn register_secret_holder(&self, holder: &Arc<dyn SecretHolder>) {
        self.kill_switch.register(holder);
    }

    /// Derive keys from `passkey` and resume the chain at the newest record.
    ///
    /// A wrong passkey and a corrupted key record both fail with
    /// [`VaultError::Authentication`].
    pub fn unlock(&self, passkey: &SecretString) -> Result<(), VaultError> {
        let _keys = self.key_record_lock.lock();
        let generation = self.context.begin_unlock();
        let record = self.key_record()?;
        let unwrapped = context::unwrap_passkey_wrap(passkey.expose_secret().as_bytes(), &record);
        self.finish_unlock(unwrapped, generation)
    }

    /// Unlock with the recovery phrase instead of the passkey.
    ///
    /// Fails with [`VaultError::RecoveryNotEnabled`] if no recovery copy was
    /// ever created, and with [`VaultError::Authentication`] for a valid
    /// mnemonic that is not this vault's.
    pub fn unlock_with_recovery(&self, phrase: &SecretString) -> Result<(), VaultError> {
        let _keys = self.key_record_lock.lock();
        let generation = self.context.begin_unlock();
        let record = self.key_record()?;
        let wrap = record.recovery.ok_or(VaultError::RecoveryNotEnabled)?;
        let unwrapped = recovery::unwrap_recovery_wrap(phrase, &wrap);
        self.finish_unlock(unwrapped, generation)
    }

    /// Seed the chain head and install the keys, unless a lock or panic
    /// landed while the KEK was being derived.
    fn finish_unlock(
        &self,
        unwrapped: Result<EpochSecret, VaultError>,
        generation: u64,
    ) -> Result<(), VaultError> {
        let result = unwrapped.and_then(|epoch_secret| {
            let _seq = self.append_lock.lock();
            self.context.ensure_generation(generation)?;
            let head = self.chain_head()?;
            self.context.install(epoch_secret, head, generation)?;
            Ok(head)
        });
        match result {
            Ok(head) => {
                info!(next_sequence_id = head.next_sequence_id, "vault unlocked");
                Ok(())
            }
            Err(e) => {
                debug!(code = e.code(), "unlock failed");
                Err(e)
            }
        }
    }

    /// Zero all keys. Idempotent.
    pub fn lock(&self) {
        self.context.lock();
        info!("vault locked");
    }

    /// Destroy all in-memory secrets, then release the store handle once
    /// in-flight appends have finished their single-row write.
    pub fn panic(&self) -> KillOutcome {
        let outcome = self.kill_switch.trigger();
        if outcome.release_store {
            let _seq = self.append_lock.lock();
            if let Err(e) = self.store.release() {
                error!(error = %e, "failed to release store after panic");
            }
        }
        outcome
    }

    /// Encrypt, chain, and persist one event.
    pub fn append_event(
        &self,
        stream_type: &str,
        stream_id: &str,
        plaintext: &[u8],
    ) -> Result<EventRecord, VaultError> {
        self.context.ensure_unlocked()?;
        let _seq = self.append_lock.lock();

        let (record, generation) = self.context.with_keys(|keys| {
            let sequence_id = keys.next_sequence_id;
            let aad = cipher::event_aad(stream_type, stream_id, sequence_id);
            let (ciphertext, nonce) = cipher::encrypt(keys.data_key, plaintext, &aad)?;
            let chain_tag =
                chain::compute_tag(keys.chain_key, &keys.last_chain_tag, plaintext, sequence_id);
            let record = EventRecord {
                sequence_id,
                stream_type: stream_type.to_string(),
                stream_id: stream_id.to_string(),
                ciphertext,
                nonce,
                chain_tag,
                timestamp: Utc::now(),
                quarantined: false,
                quarantine_reason: None,
            };
            Ok((record, keys.generation))
        })?;

        self.store.append(&record)?;
        if !self
            .context
            .advance(generation, record.sequence_id, record.chain_tag)
        {
            debug!(
                sequence_id = record.sequence_id,
                "record persisted after the vault left UNLOCKED"
            );
        }
        debug!(sequence_id = record.sequence_id, stream_type, "event appended");
        Ok(record)
    }

    /// Decrypt one event after checking its link to the predecessor.
    ///
    /// A record that fails either check is quarantined and reported as
    /// [`VaultError::ChainIntegrity`]; no plaintext is returned for it.
    pub fn read_event(&self, sequence_id: u64) -> Result<Plaintext, VaultError> {
        self.context.ensure_unlocked()?;
        let stored = self
            .store
            .get(sequence_id)?
            .ok_or(VaultError::EventNotFound(sequence_id))?;

        let reason = match stored {
            StoredEvent::Malformed(bad) => {
                debug!(sequence_id, detail = %bad.detail, "stored row is undecodable");
                QuarantineReason::ChainBreak
            }
            StoredEvent::Decoded(record) if record.quarantined => {
                return Err(VaultError::ChainIntegrity {
                    sequence_id,
                    reason: record
                        .quarantine_reason
                        .unwrap_or(QuarantineReason::ChainBreak),
                });
            }
            StoredEvent::Decoded(record) => {
                match ChainVerifier::new(&self.context, self.store.as_ref()).open(&record)? {
                    Ok(plaintext) => return Ok(plaintext),
                    Err(reason) => reason,
                }
            }
        };
        self.store.mark_quarantined(sequence_id, reason)?;
        warn!(sequence_id, %reason, "event failed integrity check on read");
        Err(VaultError::ChainIntegrity {
            sequence_id,
            reason,
        })
    }

    /// Replay `range`, quarantining each record that fails.
    ///
    /// The end of the range is clamped to the newest record.
    pub fn verify_chain(
        &self,
        range: RangeInclusive<u64>,
    ) -> Result<VerificationReport, VaultError> {
        self.context.ensure_unlocked()?;
        let start = (*range.start()).max(1);
        let anchor = ChainVerifier::new(&self.context, self.store.as_ref()).resolve_anchor(start)?;
        self.verify_chain_from(anchor, *range.end())
    }

    /// Replay from a caller-supplied anchor up to `end`.
    pub fn verify_chain_from(
        &self,
        anchor: ChainAnchor,
        end: u64,
    ) -> Result<VerificationReport, VaultError> {
        self.context.ensure_unlocked()?;
        let range = anchor.next_sequence_id..=end;
        let mut report = VerificationReport::new(&range);
        let records = self.store.scan(range)?;
        ChainVerifier::new(&self.context, self.store.as_ref()).verify_sequence(
            anchor,
            &records,
            &mut report,
        )?;
        if report.is_intact() {
            debug!(checked = report.checked, "chain verified");
        } else {
            warn!(
                checked = report.checked,
                quarantined = ?report.quarantined_ids(),
                "chain verification found issues"
            );
        }
        Ok(report)
    }

    /// Re-wrap the epoch secret under a new passkey.
    ///
    /// The recovery copy, if any, is left as it is.
    pub fn change_passkey(&self, new_passkey: &SecretString) -> Result<(), VaultError> {
        self.context.ensure_unlocked()?;
        let _keys = self.key_record_lock.lock();
        let current = self.key_record()?;

        let salt = kdf::generate_salt()?;
        let kek = kdf::derive_kek(
            new_passkey.expose_secret().as_bytes(),
            &salt,
            &current.kdf_params,
        )?;
        let (wrapped_epoch_secret, wrap_nonce) = self
            .context
            .with_keys(|keys| wrap::wrap(&kek, keys.epoch_secret))?;

        let record = SystemKeyRecord {
            salt,
            wrapped_epoch_secret,
            wrap_nonce,
            ..current
        };
        self.store.replace_key_record(&record)?;
        info!("vault passkey changed");
        Ok(())
    }

    /// Create a fresh recovery phrase and store a second wrapped copy of
    /// the epoch secret under it. Replaces any earlier recovery copy.
    ///
    /// The phrase is returned once and never stored.
    pub fn enable_recovery(&self) -> Result<SecretString, VaultError> {
        self.context.ensure_unlocked()?;
        let _keys = self.key_record_lock.lock();
        let current = self.key_record()?;

        let phrase = recovery::generate_phrase()?;
        let wrap = recovery::new_recovery_wrap(&phrase, &self.context, Utc::now())?;
        let replaced = current.recovery.is_some();
        self.store.replace_key_record(&SystemKeyRecord {
            recovery: Some(wrap),
            ..current
        })?;
        info!(replaced, "recovery phrase enabled");
        Ok(phrase)
    }

    /// Whether the key record carries a recovery copy.
    pub fn recovery_enabled(&self) -> Result<bool, VaultError> {
        Ok(self.key_record()?.recovery.is_some())
    }

    fn key_record(&self) -> Result<SystemKeyRecord, VaultError> {
        self.store
            .load_key_record()?
            .ok_or(VaultError::NotProvisioned)
    }

    fn chain_head(&self) -> Result<ChainHead, VaultError> {
        Ok(match self.store.last()? {
            Some(last) => ChainHead {
                last_tag: last.link_tag(),
                next_sequence_id: last.sequence_id().saturating_add(1),
            },
            None => ChainHead::EMPTY,
        })
    }
}
