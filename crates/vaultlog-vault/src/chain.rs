// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hash-chain linkage between consecutive events.
//!
//! ```text
//! tag(n) = HMAC-SHA256(chain_key, tag(n-1) || plaintext(n) || u64 BE n)
//! tag(0) = GENESIS (32 zero bytes)
//! ```
//!
//! [`ChainVerifier`] replays stored records against this relation. A record
//! that fails is quarantined on its own. If its payload still decrypts, the
//! replay goes on from the tag recomputed for it, so a forged tag does not
//! condemn the honest record after it. Otherwise the replay goes on from the
//! stored tag. A row that cannot be decoded is quarantined and stepped over
//! the same way, linking through its recomputed tag when its payload columns
//! survived.

use ring::hmac;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use vaultlog_core::types::{NONCE_LEN, TAG_LEN};
use vaultlog_core::{
    ChainIssue, ChainTag, EventRecord, EventStore, IssueKind, Plaintext, QuarantineReason,
    StoredEvent, VaultError, VerificationReport,
};

use crate::cipher;
use crate::context::VaultContext;
use crate::keys::{ChainKey, DataKey};

fn tag_input(prev: &ChainTag, plaintext: &[u8], sequence_id: u64) -> Zeroizing<Vec<u8>> {
    let mut msg = Zeroizing::new(Vec::with_capacity(TAG_LEN + plaintext.len() + 8));
    msg.extend_from_slice(prev.as_bytes());
    msg.extend_from_slice(plaintext);
    msg.extend_from_slice(&sequence_id.to_be_bytes());
    msg
}

/// Compute the tag for the record at `sequence_id`.
pub fn compute_tag(key: &ChainKey, prev: &ChainTag, plaintext: &[u8], sequence_id: u64) -> ChainTag {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    let tag = hmac::sign(&key, &tag_input(prev, plaintext, sequence_id));
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(tag.as_ref());
    ChainTag(out)
}

/// Constant-time check of a stored tag.
pub fn verify_tag(
    key: &ChainKey,
    prev: &ChainTag,
    plaintext: &[u8],
    sequence_id: u64,
    expected: &ChainTag,
) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
    hmac::verify(&key, &tag_input(prev, plaintext, sequence_id), expected.as_bytes()).is_ok()
}

/// Where a replay starts: the sequence id expected first, and the tag it
/// should chain from. `prev_tag` is `None` when the predecessor is missing.
///
/// `recomputed_prev` is the tag the predecessor should carry, when that
/// differs from what is stored (a forged or unreadable tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainAnchor {
    pub next_sequence_id: u64,
    pub prev_tag: Option<ChainTag>,
    pub recomputed_prev: Option<ChainTag>,
}

impl ChainAnchor {
    pub const GENESIS: ChainAnchor = ChainAnchor {
        next_sequence_id: 1,
        prev_tag: Some(ChainTag::GENESIS),
        recomputed_prev: None,
    };

    /// Anchor immediately after a record already known to be good.
    pub fn after(sequence_id: u64, tag: ChainTag) -> Self {
        Self {
            next_sequence_id: sequence_id.saturating_add(1),
            prev_tag: Some(tag),
            recomputed_prev: None,
        }
    }

    /// Resolve the anchor for a range starting at `start` from the stored
    /// predecessor alone. An undecodable predecessor anchors through its
    /// link tag; see [`ChainVerifier::resolve_anchor`] for the full rule.
    pub fn resolve(store: &dyn EventStore, start: u64) -> Result<Self, VaultError> {
        if start <= 1 {
            return Ok(Self::GENESIS);
        }
        let prev_tag = store.get(start - 1)?.map(|stored| stored.link_tag());
        Ok(Self {
            next_sequence_id: start,
            prev_tag,
            recomputed_prev: None,
        })
    }

    /// Candidate tags for the first record, most trusted first.
    fn links(&self) -> Vec<ChainTag> {
        match (self.recomputed_prev, self.prev_tag) {
            (Some(recomputed), Some(stored)) if recomputed != stored => vec![recomputed, stored],
            (recomputed, stored) => recomputed.or(stored).into_iter().collect(),
        }
    }
}

/// The columns needed to decrypt a row, borrowed from whatever decoded.
struct Sealed<'r> {
    sequence_id: u64,
    stream_type: &'r str,
    stream_id: &'r str,
    ciphertext: &'r [u8],
    nonce: &'r [u8; NONCE_LEN],
}

impl<'r> Sealed<'r> {
    fn record(record: &'r EventRecord) -> Self {
        Self {
            sequence_id: record.sequence_id,
            stream_type: &record.stream_type,
            stream_id: &record.stream_id,
            ciphertext: &record.ciphertext,
            nonce: &record.nonce,
        }
    }

    fn of(stored: &'r StoredEvent) -> Option<Self> {
        match stored {
            StoredEvent::Decoded(record) => Some(Self::record(record)),
            StoredEvent::Malformed(bad) => bad.payload.as_ref().map(|payload| Self {
                sequence_id: bad.sequence_id,
                stream_type: &payload.stream_type,
                stream_id: &payload.stream_id,
                ciphertext: &payload.ciphertext,
                nonce: &payload.nonce,
            }),
        }
    }

    fn decrypt(&self, key: &DataKey) -> Result<Plaintext, VaultError> {
        let aad = cipher::event_aad(self.stream_type, self.stream_id, self.sequence_id);
        cipher::decrypt(key, self.ciphertext, self.nonce, &aad)
    }
}

/// Outcome of checking one decoded record against candidate predecessors.
enum Checked {
    /// The payload decrypted and the stored tag links to a candidate.
    Linked(Plaintext),
    /// The payload decrypted but no candidate produces the stored tag.
    Unlinked {
        recomputed: Option<ChainTag>,
        stored: ChainTag,
    },
    /// The payload failed authentication.
    Rejected { stored: ChainTag },
}

impl Checked {
    fn issue(&self) -> Option<IssueKind> {
        match self {
            Self::Linked(_) => None,
            Self::Unlinked { .. } => Some(IssueKind::TagMismatch),
            Self::Rejected { .. } => Some(IssueKind::PayloadRejected),
        }
    }

    /// Tags the next record may chain from, most trusted first.
    fn next_links(&self, stored: ChainTag) -> Vec<ChainTag> {
        match self {
            Self::Unlinked {
                recomputed: Some(recomputed),
                stored,
            } => vec![*recomputed, *stored],
            Self::Unlinked { stored, .. } | Self::Rejected { stored } => vec![*stored],
            Self::Linked(_) => vec![stored],
        }
    }
}

/// Replays stored records and quarantines the ones that fail.
pub struct ChainVerifier<'a> {
    context: &'a VaultContext,
    store: &'a dyn EventStore,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(context: &'a VaultContext, store: &'a dyn EventStore) -> Self {
        Self { context, store }
    }

    /// Resolve the anchor for a range starting at `start`, including the
    /// predecessor's recomputed tag. A predecessor that is broken or
    /// undecodable then anchors its successor the same way a full replay
    /// would.
    pub fn resolve_anchor(&self, start: u64) -> Result<ChainAnchor, VaultError> {
        let mut anchor = ChainAnchor::resolve(self.store, start)?;
        if start > 1 && anchor.prev_tag.is_some() {
            anchor.recomputed_prev = self.recompute_stored(start - 1)?;
        }
        Ok(anchor)
    }

    /// Verify `records` (ascending) starting from `anchor`.
    ///
    /// The key lock is taken once per record and released before any store
    /// write. If the vault is locked or panicked mid-pass the replay stops
    /// with [`VaultError::Locked`].
    pub fn verify_sequence(
        &self,
        anchor: ChainAnchor,
        records: &[StoredEvent],
        report: &mut VerificationReport,
    ) -> Result<(), VaultError> {
        let mut expected = anchor.next_sequence_id;
        // Empty only while the predecessor of the first record is missing.
        let mut links = anchor.links();

        for entry in records {
            let seq = entry.sequence_id();
            report.checked += 1;

            // First id found missing ahead of this record, if any.
            let missing = if seq != expected {
                Some(expected)
            } else if links.is_empty() {
                Some(seq.saturating_sub(1))
            } else {
                None
            };

            let (issue, next_links) = match entry {
                StoredEvent::Decoded(record) => {
                    if record.quarantined {
                        report.previously_quarantined.push(seq);
                    }
                    let checked = self.check_record(record, &links)?;
                    (checked.issue(), checked.next_links(record.chain_tag))
                }
                StoredEvent::Malformed(bad) => {
                    debug!(sequence_id = seq, detail = %bad.detail, "stepping over undecodable row");
                    let mut next = Vec::with_capacity(2);
                    if let Some(prev) = links.first()
                        && let Some(sealed) = Sealed::of(entry)
                        && let Some(tag) = self.recompute(&sealed, prev)?
                    {
                        next.push(tag);
                    }
                    next.push(bad.link_tag());
                    (Some(IssueKind::MalformedRow), next)
                }
            };
            let issue = missing.map(|_| IssueKind::SequenceGap).or(issue);
            // After a gap the true predecessor is unknown; trust only the stored tag.
            let next_links = if missing.is_some() {
                vec![entry.link_tag()]
            } else {
                next_links
            };

            match issue {
                None => report.verified += 1,
                Some(kind) => {
                    let reason = kind.reason();
                    self.store.mark_quarantined(seq, reason)?;
                    warn!(sequence_id = seq, %reason, ?kind, "chain verification failed");
                    report.issues.push(ChainIssue {
                        sequence_id: seq,
                        kind,
                        reason,
                        expected_sequence_id: missing,
                    });
                }
            }

            expected = seq.saturating_add(1);
            report.last_sequence_id = Some(seq);
            report.last_chain_tag = next_links.first().copied();
            links = next_links;
        }

        debug!(
            checked = report.checked,
            verified = report.verified,
            issues = report.issues.len(),
            "chain replay finished"
        );
        Ok(())
    }

    /// Decrypt `record` after checking its link to the stored predecessor.
    ///
    /// When the predecessor's stored tag does not link, the tag recomputed
    /// for the predecessor is tried as well. On failure returns the reason
    /// the record should be quarantined with; no plaintext escapes.
    pub fn open(
        &self,
        record: &EventRecord,
    ) -> Result<Result<Plaintext, QuarantineReason>, VaultError> {
        let seq = record.sequence_id;
        let anchor = ChainAnchor::resolve(self.store, seq)?;
        let links = anchor.links();

        match self.check_record(record, &links)? {
            Checked::Linked(plaintext) => return Ok(Ok(plaintext)),
            Checked::Rejected { .. } => return Ok(Err(QuarantineReason::ChainBreak)),
            Checked::Unlinked { .. } if anchor.prev_tag.is_none() => {
                return Ok(Err(QuarantineReason::DeletionSuspected));
            }
            Checked::Unlinked { .. } => {}
        }

        if seq > 1
            && let Some(tag) = self.recompute_stored(seq - 1)?
            && let Checked::Linked(plaintext) = self.check_record(record, &[tag])?
        {
            debug!(sequence_id = seq, "linked through the predecessor's recomputed tag");
            return Ok(Ok(plaintext));
        }
        Ok(Err(QuarantineReason::ChainBreak))
    }

    /// The tag the row at `sequence_id` should carry given its stored
    /// predecessor, or `None` if either is missing or its payload is
    /// unreadable or rejected.
    fn recompute_stored(&self, sequence_id: u64) -> Result<Option<ChainTag>, VaultError> {
        let Some(stored) = self.store.get(sequence_id)? else {
            return Ok(None);
        };
        let Some(sealed) = Sealed::of(&stored) else {
            return Ok(None);
        };
        let Some(prev) = ChainAnchor::resolve(self.store, sequence_id)?.prev_tag else {
            return Ok(None);
        };
        self.recompute(&sealed, &prev)
    }

    fn recompute(&self, sealed: &Sealed<'_>, prev: &ChainTag) -> Result<Option<ChainTag>, VaultError> {
        let outcome = self.context.with_keys(|keys| {
            let plaintext = sealed.decrypt(keys.data_key)?;
            Ok(compute_tag(keys.chain_key, prev, &plaintext, sealed.sequence_id))
        });
        match outcome {
            Ok(tag) => Ok(Some(tag)),
            Err(VaultError::Authentication) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn check_record(&self, record: &EventRecord, links: &[ChainTag]) -> Result<Checked, VaultError> {
        let seq = record.sequence_id;
        let sealed = Sealed::record(record);
        let outcome = self.context.with_keys(|keys| {
            let plaintext = sealed.decrypt(keys.data_key)?;
            let linked = links
                .iter()
                .any(|prev| verify_tag(keys.chain_key, prev, &plaintext, seq, &record.chain_tag));
            if linked {
                return Ok(Checked::Linked(plaintext));
            }
            Ok(Checked::Unlinked {
                recomputed: links
                    .first()
                    .map(|prev| compute_tag(keys.chain_key, prev, &plaintext, seq)),
                stored: record.chain_tag,
            })
        });
        match outcome {
            Err(VaultError::Authentication) => Ok(Checked::Rejected {
                stored: record.chain_tag,
            }),
            other => other,
        }
    }
}
