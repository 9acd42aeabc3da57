// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record and report types shared by the vault, the stores, and callers.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use zeroize::Zeroizing;

use crate::error::VaultError;

/// Length of every symmetric key in the hierarchy (256 bits).
pub const KEY_LEN: usize = 32;

/// Length of an XChaCha20-Poly1305 nonce (192 bits).
pub const NONCE_LEN: usize = 24;

/// Length of an Argon2id salt.
pub const SALT_LEN: usize = 16;

/// Length of a chain tag (HMAC-SHA256 output).
pub const TAG_LEN: usize = 32;

/// Decrypted event payload. Zeroed when dropped.
pub type Plaintext = Zeroizing<Vec<u8>>;

/// Lifecycle state of a vault context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultState {
    /// No key material in memory. Initial state and the state after `lock()`.
    Locked,
    /// Working keys are live.
    Unlocked,
    /// Keys were destroyed by an emergency trigger.
    Panic,
}

/// Why a record was quarantined.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    /// The stored tag does not recompute from the plaintext and predecessor,
    /// or the payload itself failed authentication.
    ChainBreak,
    /// The record follows a gap in `sequence_id`.
    DeletionSuspected,
}

/// Argon2id cost parameters persisted alongside the wrapped epoch secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl KdfParams {
    /// The only profile accepted for the passkey wrap: 19 MiB, two passes,
    /// one lane.
    ///
    /// A single lane keeps the memory access pattern on one thread, which
    /// narrows the cross-process side channel.
    pub const LOCKED: KdfParams = KdfParams {
        memory_kib: 19 * 1024,
        iterations: 2,
        parallelism: 1,
    };

    /// Profile for the recovery-phrase wrap: 64 MiB, two passes, four lanes.
    pub const RECOVERY: KdfParams = KdfParams {
        memory_kib: 64 * 1024,
        iterations: 2,
        parallelism: 4,
    };

    /// Returns `true` when these parameters equal [`KdfParams::LOCKED`].
    pub fn is_locked_profile(&self) -> bool {
        *self == Self::LOCKED
    }
}

impl fmt::Display for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m={}KiB,t={},p={}",
            self.memory_kib, self.iterations, self.parallelism
        )
    }
}

/// A keyed-hash value binding an event to its predecessor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainTag(pub [u8; TAG_LEN]);

impl ChainTag {
    /// The anchor the first record chains from: 32 zero bytes.
    pub const GENESIS: ChainTag = ChainTag([0u8; TAG_LEN]);

    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }

    /// Parse a tag from a stored blob of exactly [`TAG_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; TAG_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainTag({})", &self.to_hex()[..16])
    }
}

/// The singleton record that lets a passkey re-establish the key hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemKeyRecord {
    pub salt: [u8; SALT_LEN],
    /// XChaCha20-Poly1305 ciphertext of the epoch secret, tag appended.
    pub wrapped_epoch_secret: Vec<u8>,
    pub wrap_nonce: [u8; NONCE_LEN],
    pub kdf_params: KdfParams,
    pub created_at: DateTime<Utc>,
    /// Second copy of the epoch secret, wrapped under the recovery phrase.
    pub recovery: Option<RecoveryWrap>,
}

/// The epoch secret wrapped under a key derived from a BIP39 recovery phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryWrap {
    pub salt: [u8; SALT_LEN],
    pub wrapped_epoch_secret: Vec<u8>,
    pub wrap_nonce: [u8; NONCE_LEN],
    pub kdf_params: KdfParams,
    pub created_at: DateTime<Utc>,
}

/// One durable, encrypted, chained event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence_id: u64,
    pub stream_type: String,
    pub stream_id: String,
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub chain_tag: ChainTag,
    pub timestamp: DateTime<Utc>,
    pub quarantined: bool,
    pub quarantine_reason: Option<QuarantineReason>,
}

/// A stored event row whose columns could not be decoded.
///
/// Carries whatever could still be read so a replay can step past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEvent {
    pub sequence_id: u64,
    /// The stored tag, if that column was intact.
    pub chain_tag: Option<ChainTag>,
    /// The sealed payload, if its columns were intact.
    pub payload: Option<SealedPayload>,
    pub detail: String,
}

/// The encrypted parts of a row, enough to decrypt it and recompute its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub stream_type: String,
    pub stream_id: String,
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl MalformedEvent {
    /// Tag a successor is expected to chain from.
    ///
    /// An unreadable tag is replaced by [`ChainTag::GENESIS`]; records
    /// appended after the damage chain from that value.
    pub fn link_tag(&self) -> ChainTag {
        self.chain_tag.unwrap_or(ChainTag::GENESIS)
    }
}

/// One row as a store returns it: decoded, or flagged as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredEvent {
    Decoded(EventRecord),
    Malformed(MalformedEvent),
}

impl StoredEvent {
    pub fn sequence_id(&self) -> u64 {
        match self {
            Self::Decoded(record) => record.sequence_id,
            Self::Malformed(bad) => bad.sequence_id,
        }
    }

    /// Tag a successor is expected to chain from.
    pub fn link_tag(&self) -> ChainTag {
        match self {
            Self::Decoded(record) => record.chain_tag,
            Self::Malformed(bad) => bad.link_tag(),
        }
    }

    pub fn record(&self) -> Option<&EventRecord> {
        match self {
            Self::Decoded(record) => Some(record),
            Self::Malformed(_) => None,
        }
    }

    /// Convert into a record, or the error a point read reports for it.
    pub fn into_record(self) -> Result<EventRecord, VaultError> {
        match self {
            Self::Decoded(record) => Ok(record),
            Self::Malformed(bad) => Err(VaultError::MalformedEvent {
                sequence_id: bad.sequence_id,
                detail: bad.detail,
            }),
        }
    }
}

/// What a verification pass found wrong with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// `sequence_id` jumped past one or more missing records.
    SequenceGap,
    /// The payload failed AEAD authentication, so no tag could be recomputed.
    PayloadRejected,
    /// The recomputed tag differs from the stored one.
    TagMismatch,
    /// The stored row could not be decoded at all.
    MalformedRow,
}

impl IssueKind {
    /// The quarantine reason recorded for this kind of issue.
    pub fn reason(self) -> QuarantineReason {
        match self {
            Self::SequenceGap => QuarantineReason::DeletionSuspected,
            Self::PayloadRejected | Self::TagMismatch | Self::MalformedRow => {
                QuarantineReason::ChainBreak
            }
        }
    }
}

/// A single failed record in a [`VerificationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIssue {
    pub sequence_id: u64,
    pub kind: IssueKind,
    pub reason: QuarantineReason,
    /// For gaps: the first sequence id found missing ahead of this record.
    pub expected_sequence_id: Option<u64>,
}

/// Outcome of replaying a range of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// First and last sequence id requested.
    pub requested: (u64, u64),
    /// Number of records examined.
    pub checked: u64,
    /// Number of records whose tag recomputed correctly.
    pub verified: u64,
    /// Records that failed, in sequence order.
    pub issues: Vec<ChainIssue>,
    /// Sequence ids of records that were already quarantined before this pass.
    pub previously_quarantined: Vec<u64>,
    /// Last sequence id examined, if any.
    pub last_sequence_id: Option<u64>,
    /// Tag the record after the last one examined should chain from; anchors
    /// the next incremental pass.
    pub last_chain_tag: Option<ChainTag>,
}

impl VerificationReport {
    pub fn new(range: &RangeInclusive<u64>) -> Self {
        Self {
            requested: (*range.start(), *range.end()),
            checked: 0,
            verified: 0,
            issues: Vec::new(),
            previously_quarantined: Vec::new(),
            last_sequence_id: None,
            last_chain_tag: None,
        }
    }

    /// `true` when no record in the range failed.
    pub fn is_intact(&self) -> bool {
        self.issues.is_empty()
    }

    /// Sequence ids quarantined (or re-confirmed) by this pass.
    pub fn quarantined_ids(&self) -> Vec<u64> {
        self.issues.iter().map(|i| i.sequence_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn quarantine_reason_string_forms() {
        assert_eq!(QuarantineReason::ChainBreak.to_string(), "chain_break");
        assert_eq!(
            QuarantineReason::DeletionSuspected.to_string(),
            "deletion_suspected"
        );
        assert_eq!(
            QuarantineReason::from_str("deletion_suspected").unwrap(),
            QuarantineReason::DeletionSuspected
        );
    }

    #[test]
    fn vault_state_display() {
        assert_eq!(VaultState::Locked.to_string(), "LOCKED");
        assert_eq!(VaultState::Panic.to_string(), "PANIC");
        let json = serde_json::to_string(&VaultState::Unlocked).unwrap();
        assert_eq!(json, "\"UNLOCKED\"");
    }

    #[test]
    fn locked_profile_is_recognised() {
        assert!(KdfParams::LOCKED.is_locked_profile());
        let weaker = KdfParams {
            memory_kib: 8 * 1024,
            ..KdfParams::LOCKED
        };
        assert!(!weaker.is_locked_profile());
    }

    #[test]
    fn chain_tag_from_slice_requires_exact_length() {
        assert!(ChainTag::from_slice(&[1u8; TAG_LEN]).is_some());
        assert!(ChainTag::from_slice(&[1u8; TAG_LEN - 1]).is_none());
        assert_eq!(ChainTag::GENESIS.as_bytes(), &[0u8; TAG_LEN]);
    }

    #[test]
    fn issue_kind_maps_to_reason() {
        assert_eq!(
            IssueKind::SequenceGap.reason(),
            QuarantineReason::DeletionSuspected
        );
        assert_eq!(IssueKind::TagMismatch.reason(), QuarantineReason::ChainBreak);
        assert_eq!(
            IssueKind::PayloadRejected.reason(),
            QuarantineReason::ChainBreak
        );
        assert_eq!(IssueKind::MalformedRow.reason(), QuarantineReason::ChainBreak);
    }

    #[test]
    fn recovery_profile_is_heavier_than_passkey_profile() {
        assert!(KdfParams::RECOVERY.memory_kib > KdfParams::LOCKED.memory_kib);
        assert!(!KdfParams::RECOVERY.is_locked_profile());
    }

    #[test]
    fn malformed_row_links_from_genesis_without_a_tag() {
        let bad = MalformedEvent {
            sequence_id: 4,
            chain_tag: None,
            payload: None,
            detail: "nonce length".into(),
        };
        assert_eq!(bad.link_tag(), ChainTag::GENESIS);

        let stored = StoredEvent::Malformed(MalformedEvent {
            chain_tag: Some(ChainTag([7u8; TAG_LEN])),
            ..bad
        });
        assert_eq!(stored.sequence_id(), 4);
        assert_eq!(stored.link_tag(), ChainTag([7u8; TAG_LEN]));
        assert!(stored.record().is_none());
        assert!(matches!(
            stored.into_record(),
            Err(VaultError::MalformedEvent { sequence_id: 4, .. })
        ));
    }
}
