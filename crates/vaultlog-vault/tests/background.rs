// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental verifier and decoy writer.

mod common;

use std::time::Duration;

use common::*;
use tokio_util::sync::CancellationToken;
use vaultlog_core::{ChainTag, EventStore, QuarantineReason};
use vaultlog_vault::{DecoyWriter, IncrementalVerifier};

#[test]
fn checkpoint_advances_only_over_new_records() {
    let (_store, vault) = memory_vault();
    let verifier = IncrementalVerifier::new(vault.clone());
    assert!(verifier.checkpoint().is_none());

    let empty = verifier.verify_new().unwrap();
    assert_eq!(empty.checked, 0);
    assert!(verifier.checkpoint().is_none());

    append_numbered(&vault, 3);
    let first = verifier.verify_new().unwrap();
    assert_eq!(first.checked, 3);
    assert_eq!(verifier.checkpoint().unwrap().sequence_id, 3);

    append_numbered(&vault, 2);
    let second = verifier.verify_new().unwrap();
    assert_eq!(second.checked, 2);
    assert_eq!(second.requested.0, 4);
    assert_eq!(verifier.checkpoint().unwrap().sequence_id, 5);
}

#[test]
fn incremental_pass_chains_from_the_cached_tag() {
    let (store, vault) = memory_vault();
    let verifier = IncrementalVerifier::new(vault.clone());
    append_numbered(&vault, 2);
    verifier.verify_new().unwrap();

    store.tamper(2, |r| r.chain_tag = ChainTag([7; 32]));
    append_numbered(&vault, 1);

    // The incremental pass anchors on the tag it verified earlier.
    let incremental = verifier.verify_new().unwrap();
    assert!(incremental.is_intact());
    assert_eq!(verifier.checkpoint().unwrap().sequence_id, 3);

    // A full replay reads the rewritten tag from disk and flags only its row.
    let full = vault.verify_chain(1..=3).unwrap();
    assert_eq!(full.quarantined_ids(), vec![2]);
    assert_eq!(full.verified, 2);
}

#[test]
fn checkpoint_holds_when_a_pass_finds_issues() {
    let (store, vault) = memory_vault();
    let verifier = IncrementalVerifier::new(vault.clone());
    append_numbered(&vault, 3);
    store.delete(2);

    let report = verifier.verify_new().unwrap();
    assert_eq!(report.issues[0].reason, QuarantineReason::DeletionSuspected);
    assert!(verifier.checkpoint().is_none());
}

#[test]
fn kill_switch_wipes_the_checkpoint() {
    let (_store, vault) = memory_vault();
    let verifier = IncrementalVerifier::new(vault.clone());
    append_numbered(&vault, 2);
    verifier.verify_new().unwrap();
    assert!(verifier.checkpoint().is_some());
    assert_eq!(vault.kill_switch().live_holders(), 1);

    let outcome = vault.panic();
    assert_eq!(outcome.holders_wiped, 1);
    assert!(verifier.checkpoint().is_none());
    assert!(verifier.verify_new().unwrap_err().is_locked());
}

#[test]
fn decoy_writes_random_events_and_skips_when_locked() {
    let (store, vault) = memory_vault();
    let decoy = DecoyWriter::new(vault.clone(), Duration::from_secs(60), "decoy", 16..=32);

    let record = decoy.write_once().unwrap().expect("vault unlocked");
    assert_eq!(record.stream_type, "decoy");
    assert_eq!(record.stream_id.len(), 16);
    let plaintext = vault.read_event(record.sequence_id).unwrap();
    assert!((16..=32).contains(&plaintext.len()));

    vault.lock();
    assert!(decoy.write_once().unwrap().is_none());
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_tasks_run_until_cancelled() {
    let (store, vault) = memory_vault();
    let cancel = CancellationToken::new();

    let decoy = DecoyWriter::new(vault.clone(), Duration::from_millis(20), "decoy", 8..=8);
    let decoy_task = decoy.spawn(cancel.clone());
    let verifier = IncrementalVerifier::new(vault.clone());
    let verifier_task = verifier
        .clone()
        .spawn_background(Duration::from_millis(20), cancel.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    decoy_task.await.unwrap();
    verifier_task.await.unwrap();

    let written = store.len();
    assert!(written >= 1, "no decoys written");
    let last = store.last().unwrap().unwrap().into_record().unwrap();
    assert!(last.stream_type == "decoy");
    assert!(vault.verify_chain(1..=u64::MAX).unwrap().is_intact());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(store.len(), written);
}
