// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests against an on-disk vault.
//!
//! Each test builds an isolated TestVault on a temp SQLite file and tampers
//! with rows directly, the way an attacker with disk access would.

use vaultlog_core::{ChainTag, EventStore, IssueKind, QuarantineReason, VaultError, VaultState};
use vaultlog_test_utils::TestVault;

// ---- Round trip across a restart ----

#[test]
fn events_survive_restart_and_stay_verifiable() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(5).unwrap();
    harness.vault.lock();

    let restarted = harness.reopen().unwrap();
    assert_eq!(restarted.state(), VaultState::Locked);
    restarted.unlock(&harness.passkey).unwrap();

    for seq in 1..=5 {
        let plaintext = restarted.read_event(seq).unwrap();
        assert_eq!(&*plaintext, format!("event-{seq}").as_bytes());
    }
    let report = restarted.verify_chain(1..=5).unwrap();
    assert!(report.is_intact());
    assert_eq!(report.verified, 5);
}

#[test]
fn stored_rows_carry_no_plaintext() {
    let harness = TestVault::new().unwrap();
    let record = harness
        .vault
        .append_event("audit", "s", b"a very recognisable payload")
        .unwrap();
    let stored = harness
        .store
        .get(record.sequence_id)
        .unwrap()
        .unwrap()
        .into_record()
        .unwrap();
    let needle = b"recognisable";
    assert!(!stored.ciphertext.windows(needle.len()).any(|w| w == needle));
}

// ---- Tampering on disk ----

#[test]
fn deleted_row_is_reported_as_deletion_suspected() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(5).unwrap();
    assert!(harness.delete_row(2).unwrap());

    let report = harness.vault.verify_chain(1..=5).unwrap();
    assert_eq!(report.quarantined_ids(), vec![3]);
    assert_eq!(report.issues[0].kind, IssueKind::SequenceGap);
    assert_eq!(
        harness.quarantine_of(3).unwrap().as_deref(),
        Some("deletion_suspected")
    );
    assert_eq!(&*harness.vault.read_event(4).unwrap(), b"event-4");
}

#[test]
fn flipped_ciphertext_bit_fails_authentication() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(3).unwrap();
    assert!(harness.flip_ciphertext_bit(2).unwrap());

    match harness.vault.read_event(2) {
        Err(VaultError::ChainIntegrity {
            sequence_id: 2,
            reason: QuarantineReason::ChainBreak,
        }) => {}
        other => panic!("expected chain break, got {other:?}"),
    }
    assert_eq!(
        harness.quarantine_of(2).unwrap().as_deref(),
        Some("chain_break")
    );
    assert_eq!(&*harness.vault.read_event(3).unwrap(), b"event-3");
}

#[test]
fn forged_tag_is_a_mismatch() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(3).unwrap();
    harness.overwrite_chain_tag(3, ChainTag([0x5A; 32])).unwrap();

    let report = harness.vault.verify_chain(1..=3).unwrap();
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].sequence_id, 3);
    assert_eq!(report.issues[0].kind, IssueKind::TagMismatch);
}

#[test]
fn forged_tag_mid_chain_spares_the_next_record() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(4).unwrap();
    harness.overwrite_chain_tag(2, ChainTag([0x5A; 32])).unwrap();

    assert_eq!(&*harness.vault.read_event(3).unwrap(), b"event-3");
    let report = harness.vault.verify_chain(1..=4).unwrap();
    assert_eq!(report.quarantined_ids(), vec![2]);
    assert_eq!(harness.quarantine_of(3).unwrap(), None);
}

#[test]
fn truncated_chain_tag_is_quarantined_not_fatal() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(4).unwrap();
    assert!(harness.truncate_chain_tag(2).unwrap());

    let report = harness.vault.verify_chain(1..=4).unwrap();
    assert_eq!(report.quarantined_ids(), vec![2]);
    assert_eq!(report.issues[0].kind, IssueKind::MalformedRow);
    assert_eq!(report.verified, 3);
    assert_eq!(
        harness.quarantine_of(2).unwrap().as_deref(),
        Some("chain_break")
    );
    assert!(matches!(
        harness.vault.read_event(2),
        Err(VaultError::ChainIntegrity {
            sequence_id: 2,
            reason: QuarantineReason::ChainBreak
        })
    ));
    assert_eq!(&*harness.vault.read_event(3).unwrap(), b"event-3");
}

#[test]
fn garbled_timestamp_is_quarantined_not_fatal() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(3).unwrap();
    assert!(harness.garble_timestamp(3).unwrap());

    assert!(matches!(
        harness.vault.read_event(3),
        Err(VaultError::ChainIntegrity { sequence_id: 3, .. })
    ));
    let report = harness.vault.verify_chain(1..=3).unwrap();
    assert_eq!(report.quarantined_ids(), vec![3]);
    assert_eq!(report.issues[0].kind, IssueKind::MalformedRow);
}

#[test]
fn damage_helpers_are_noops_in_memory() {
    let harness = TestVault::builder().in_memory().build().unwrap();
    harness.append_numbered(1).unwrap();
    assert!(!harness.truncate_chain_tag(1).unwrap());
    assert!(!harness.garble_timestamp(1).unwrap());
}

#[test]
fn reordered_rows_are_both_rejected() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(4).unwrap();
    harness.swap_rows(2, 3).unwrap();

    let report = harness.vault.verify_chain(1..=4).unwrap();
    let ids = report.quarantined_ids();
    assert!(ids.contains(&2) && ids.contains(&3), "quarantined: {ids:?}");
    assert!(report
        .issues
        .iter()
        .filter(|i| i.sequence_id <= 3)
        .all(|i| i.kind == IssueKind::PayloadRejected));
}

#[test]
fn in_memory_harness_behaves_the_same() {
    let harness = TestVault::builder().in_memory().build().unwrap();
    assert!(harness.database_path().is_none());
    harness.append_numbered(3).unwrap();
    harness.delete_row(1).unwrap();

    let report = harness.vault.verify_chain(1..=3).unwrap();
    assert_eq!(report.quarantined_ids(), vec![2]);
}

// ---- Locking, panic, rotation ----

#[test]
fn panic_then_reunlock_extends_the_chain() {
    let harness = TestVault::new().unwrap();
    harness.append_numbered(3).unwrap();

    let outcome = harness.vault.panic();
    assert!(outcome.release_store);
    assert!(harness
        .vault
        .append_event("audit", "s", b"x")
        .unwrap_err()
        .is_locked());

    harness.unlock().unwrap();
    let record = harness.vault.append_event("audit", "s", b"event-4").unwrap();
    assert_eq!(record.sequence_id, 4);
    assert!(harness.vault.verify_chain(1..=4).unwrap().is_intact());
}

#[test]
fn rekey_keeps_events_readable_after_restart() {
    let harness = TestVault::builder()
        .with_passkey("the original passkey")
        .build()
        .unwrap();
    harness.append_numbered(2).unwrap();

    let new_passkey = secrecy::SecretString::from("the replacement passkey".to_string());
    harness.vault.change_passkey(&new_passkey).unwrap();

    let restarted = harness.reopen().unwrap();
    assert!(matches!(
        restarted.unlock(&harness.passkey),
        Err(VaultError::Authentication)
    ));
    restarted.unlock(&new_passkey).unwrap();
    assert_eq!(&*restarted.read_event(2).unwrap(), b"event-2");
}
