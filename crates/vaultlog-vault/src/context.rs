// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory key state: `LOCKED` → `UNLOCKED` → `PANIC`.
//!
//! All live key material sits behind one [`RwLock`]. Crypto runs under the
//! read side through [`VaultContext::with_keys`]; `unlock`, `lock` and `panic`
//! take the write side, so no reader can observe a half-cleared key. No I/O
//! happens while the lock is held.
//!
//! A generation counter is bumped on every transition. Work that started
//! under one generation (an append waiting on storage, an unlock running
//! Argon2id) only commits if the generation is unchanged.

use parking_lot::RwLock;
use tracing::debug;

use vaultlog_core::{ChainTag, KdfParams, SystemKeyRecord, VaultError, VaultState};

use crate::keys::{ChainKey, DataKey, EpochSecret};
use crate::{kdf, wrap};

/// The newest durable record, used to seed sequencing on unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub last_tag: ChainTag,
    pub next_sequence_id: u64,
}

impl ChainHead {
    /// The head of an empty log.
    pub const EMPTY: ChainHead = ChainHead {
        last_tag: ChainTag::GENESIS,
        next_sequence_id: 1,
    };
}

struct Secrets {
    epoch_secret: EpochSecret,
    data_key: DataKey,
    chain_key: ChainKey,
}

struct Inner {
    state: VaultState,
    secrets: Option<Secrets>,
    last_chain_tag: Option<ChainTag>,
    next_sequence_id: u64,
    generation: u64,
}

impl Inner {
    /// Drop every secret. `Secrets` fields zero themselves on drop.
    fn clear(&mut self, state: VaultState) {
        self.secrets = None;
        self.last_chain_tag = None;
        self.next_sequence_id = 0;
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Borrowed view of the live keys, valid for one [`VaultContext::with_keys`] call.
pub struct KeyView<'a> {
    pub epoch_secret: &'a EpochSecret,
    pub data_key: &'a DataKey,
    pub chain_key: &'a ChainKey,
    pub last_chain_tag: ChainTag,
    pub next_sequence_id: u64,
    pub generation: u64,
}

/// Owner of the epoch secret and the working keys.
pub struct VaultContext {
    inner: RwLock<Inner>,
}

impl Default for VaultContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VaultContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultContext")
            .field("state", &self.state())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl VaultContext {
    /// A context in the `LOCKED` state.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: VaultState::Locked,
                secrets: None,
                last_chain_tag: None,
                next_sequence_id: 0,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> VaultState {
        self.inner.read().state
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Fail with [`VaultError::Locked`] unless `UNLOCKED`.
    pub fn ensure_unlocked(&self) -> Result<(), VaultError> {
        match self.state() {
            VaultState::Unlocked => Ok(()),
            state => Err(VaultError::Locked { state }),
        }
    }

    /// Derive the KEK, unwrap the epoch secret, and go `UNLOCKED`.
    ///
    /// A context in `PANIC` is first reset to `LOCKED`. On any failure the
    /// state stays `LOCKED`. Argon2id runs without the key lock held; if a
    /// lock or panic lands meanwhile, the unlock is abandoned.
    pub fn unlock(
        &self,
        passkey: &[u8],
        record: &SystemKeyRecord,
        head: ChainHead,
    ) -> Result<(), VaultError> {
        let generation = self.begin_unlock();
        let epoch_secret = unwrap_passkey_wrap(passkey, record)?;
        self.install(epoch_secret, head, generation)
    }

    /// Reset `PANIC` to `LOCKED` and return the generation an unlock must
    /// still see when it installs its keys.
    pub(crate) fn begin_unlock(&self) -> u64 {
        let mut inner = self.inner.write();
        if inner.state == VaultState::Panic {
            inner.clear(VaultState::Locked);
            debug!("vault reset from PANIC to LOCKED");
        }
        inner.generation
    }

    /// Fail with `Locked` if any transition happened since `generation`.
    pub(crate) fn ensure_generation(&self, generation: u64) -> Result<(), VaultError> {
        let inner = self.inner.read();
        if inner.generation == generation {
            Ok(())
        } else {
            Err(VaultError::Locked { state: inner.state })
        }
    }

    /// Install an already unwrapped epoch secret (used at provisioning).
    ///
    /// Fails with `Locked` if a transition happened since `generation` was read.
    pub(crate) fn install(
        &self,
        epoch_secret: EpochSecret,
        head: ChainHead,
        generation: u64,
    ) -> Result<(), VaultError> {
        let (data_key, chain_key) = epoch_secret.derive_working_keys()?;

        let mut inner = self.inner.write();
        if inner.generation != generation {
            return Err(VaultError::Locked { state: inner.state });
        }
        inner.secrets = Some(Secrets {
            epoch_secret,
            data_key,
            chain_key,
        });
        inner.last_chain_tag = Some(head.last_tag);
        inner.next_sequence_id = head.next_sequence_id;
        inner.state = VaultState::Unlocked;
        inner.generation = inner.generation.wrapping_add(1);
        debug!(next_sequence_id = head.next_sequence_id, "vault context unlocked");
        Ok(())
    }

    /// Zero all keys and go `LOCKED`. Safe from any state.
    pub fn lock(&self) {
        let mut inner = self.inner.write();
        let was = inner.state;
        inner.clear(VaultState::Locked);
        debug!(from = %was, "vault context locked");
    }

    /// Zero all keys and go `PANIC`.
    pub fn panic(&self) {
        self.inner.write().clear(VaultState::Panic);
    }

    /// Run `f` with the live keys under the read lock.
    ///
    /// Returns [`VaultError::Locked`] outside `UNLOCKED` without calling `f`.
    pub fn with_keys<T>(
        &self,
        f: impl FnOnce(KeyView<'_>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let inner = self.inner.read();
        match (&inner.state, &inner.secrets, inner.last_chain_tag) {
            (VaultState::Unlocked, Some(secrets), Some(last_chain_tag)) => f(KeyView {
                epoch_secret: &secrets.epoch_secret,
                data_key: &secrets.data_key,
                chain_key: &secrets.chain_key,
                last_chain_tag,
                next_sequence_id: inner.next_sequence_id,
                generation: inner.generation,
            }),
            (state, _, _) => Err(VaultError::Locked { state: *state }),
        }
    }

    /// Move the chain head forward after a durable append.
    ///
    /// Returns `false` (and changes nothing) if the context left `UNLOCKED`
    /// or was re-unlocked since `generation`.
    pub fn advance(&self, generation: u64, sequence_id: u64, tag: ChainTag) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation || inner.state != VaultState::Unlocked {
            return false;
        }
        inner.last_chain_tag = Some(tag);
        inner.next_sequence_id = inner.next_sequence_id.max(sequence_id.saturating_add(1));
        true
    }
}

/// Check the profile, derive the KEK, and unwrap the passkey copy of the
/// epoch secret.
pub(crate) fn unwrap_passkey_wrap(
    passkey: &[u8],
    record: &SystemKeyRecord,
) -> Result<EpochSecret, VaultError> {
    kdf::check_params(&record.kdf_params, &KdfParams::LOCKED)?;
    let kek = kdf::derive_kek(passkey, &record.salt, &record.kdf_params)?;
    wrap::unwrap(&kek, &record.wrapped_epoch_secret, &record.wrap_nonce)
}

/// Build a provisioning record for `epoch_secret` under `passkey`.
pub(crate) fn new_key_record(
    passkey: &[u8],
    epoch_secret: &EpochSecret,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<SystemKeyRecord, VaultError> {
    let salt = kdf::generate_salt()?;
    let kek = kdf::derive_kek(passkey, &salt, &KdfParams::LOCKED)?;
    let (wrapped_epoch_secret, wrap_nonce) = wrap::wrap(&kek, epoch_secret)?;
    Ok(SystemKeyRecord {
        salt,
        wrapped_epoch_secret,
        wrap_nonce,
        kdf_params: KdfParams::LOCKED,
        created_at,
        recovery: None,
    })
}
