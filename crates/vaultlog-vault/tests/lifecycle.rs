// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unlock, lock, restart, passkey rotation and the recovery phrase.

mod common;

use std::sync::Arc;

use common::*;
use secrecy::ExposeSecret;
use vaultlog_core::{EventStore, KdfParams, VaultError, VaultState};
use vaultlog_vault::recovery;

#[test]
fn restart_comes_up_locked_and_resumes_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let (store, vault) = sqlite_vault(&dir);
    append_numbered(&vault, 3);
    drop(vault);

    let vault = reopen(store.clone());
    assert_eq!(vault.state(), VaultState::Locked);
    assert!(vault.read_event(1).unwrap_err().is_locked());

    vault.unlock(&passkey(PASSKEY)).unwrap();
    let record = vault.append_event("audit", "stream-a", b"event-4").unwrap();
    assert_eq!(record.sequence_id, 4);

    let report = vault.verify_chain(1..=u64::MAX).unwrap();
    assert!(report.is_intact());
    assert_eq!(report.verified, 4);
    assert_eq!(&*vault.read_event(2).unwrap(), b"event-2");
}

#[test]
fn wrong_passkey_and_corrupted_wrap_fail_alike() {
    let (store, vault) = memory_vault();
    vault.lock();

    let wrong = vault.unlock(&passkey("not the passkey")).unwrap_err();
    assert!(matches!(wrong, VaultError::Authentication));
    assert_eq!(vault.state(), VaultState::Locked);

    let mut record = store.load_key_record().unwrap().unwrap();
    record.wrapped_epoch_secret[0] ^= 0x80;
    store.replace_key_record(&record).unwrap();

    let corrupted = vault.unlock(&passkey(PASSKEY)).unwrap_err();
    assert!(matches!(corrupted, VaultError::Authentication));
    assert_eq!(wrong.to_string(), corrupted.to_string());
    assert_eq!(vault.state(), VaultState::Locked);
}

#[test]
fn weakened_kdf_parameters_are_refused() {
    let (store, vault) = memory_vault();
    vault.lock();

    let mut record = store.load_key_record().unwrap().unwrap();
    record.kdf_params.memory_kib = 1024;
    store.replace_key_record(&record).unwrap();

    let err = vault.unlock(&passkey(PASSKEY)).unwrap_err();
    assert!(matches!(err, VaultError::Config(_)));
    assert_eq!(vault.state(), VaultState::Locked);
}

#[test]
fn lock_is_idempotent() {
    let (_store, vault) = memory_vault();
    vault.lock();
    vault.lock();
    assert_eq!(vault.state(), VaultState::Locked);

    let err = vault.append_event("audit", "s", b"x").unwrap_err();
    assert!(err.is_locked());
    assert!(vault.verify_chain(1..=10).unwrap_err().is_locked());
}

#[test]
fn unlock_with_no_events_starts_at_one() {
    let (store, vault) = memory_vault();
    vault.lock();
    vault.unlock(&passkey(PASSKEY)).unwrap();
    let record = vault.append_event("audit", "s", b"first").unwrap();
    assert_eq!(record.sequence_id, 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn change_passkey_rewraps_without_touching_events() {
    let (store, vault) = memory_vault();
    append_numbered(&vault, 2);
    let before = store.load_key_record().unwrap().unwrap();

    vault.change_passkey(&passkey("a brand new passkey")).unwrap();
    let after = store.load_key_record().unwrap().unwrap();
    assert_ne!(before.salt, after.salt);
    assert_eq!(before.created_at, after.created_at);
    assert_eq!(before.kdf_params, after.kdf_params);

    let restarted = reopen(store.clone());
    assert!(matches!(
        restarted.unlock(&passkey(PASSKEY)).unwrap_err(),
        VaultError::Authentication
    ));
    restarted.unlock(&passkey("a brand new passkey")).unwrap();
    assert_eq!(&*restarted.read_event(1).unwrap(), b"event-1");
    assert!(restarted.verify_chain(1..=2).unwrap().is_intact());
}

#[test]
fn change_passkey_requires_unlocked() {
    let (_store, vault) = memory_vault();
    vault.lock();
    assert!(vault
        .change_passkey(&passkey("another passkey"))
        .unwrap_err()
        .is_locked());
}

#[test]
fn concurrent_unlock_attempts_settle_unlocked() {
    let (store, vault) = memory_vault();
    append_numbered(&vault, 1);
    let vault = Arc::new(reopen(store.clone()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || vault.unlock(&passkey(PASSKEY)))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(vault.state(), VaultState::Unlocked);

    let next = vault.append_event("audit", "s", b"next").unwrap();
    assert_eq!(next.sequence_id, 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn recovery_phrase_unlocks_after_the_passkey_is_lost() {
    let (store, vault) = memory_vault();
    append_numbered(&vault, 2);
    assert!(!vault.recovery_enabled().unwrap());

    let phrase = vault.enable_recovery().unwrap();
    assert!(recovery::validate_phrase(phrase.expose_secret()));
    assert!(vault.recovery_enabled().unwrap());
    let stored = store.load_key_record().unwrap().unwrap();
    assert_eq!(stored.recovery.unwrap().kdf_params, KdfParams::RECOVERY);

    let restarted = reopen(store.clone());
    restarted.unlock_with_recovery(&phrase).unwrap();
    assert_eq!(restarted.state(), VaultState::Unlocked);
    assert_eq!(&*restarted.read_event(2).unwrap(), b"event-2");
    let next = restarted
        .append_event("audit", "stream-a", b"event-3")
        .unwrap();
    assert_eq!(next.sequence_id, 3);

    // A new passkey leaves the recovery copy in place.
    restarted
        .change_passkey(&passkey("replacement passkey"))
        .unwrap();
    restarted.lock();
    restarted.unlock(&passkey("replacement passkey")).unwrap();
    restarted.lock();
    restarted.unlock_with_recovery(&phrase).unwrap();
    assert!(restarted.verify_chain(1..=3).unwrap().is_intact());
}

#[test]
fn recovery_unlock_failures_leave_the_vault_locked() {
    let (_store, vault) = memory_vault();
    vault.lock();
    let stranger = recovery::generate_phrase().unwrap();
    assert!(matches!(
        vault.unlock_with_recovery(&stranger).unwrap_err(),
        VaultError::RecoveryNotEnabled
    ));

    vault.unlock(&passkey(PASSKEY)).unwrap();
    let phrase = vault.enable_recovery().unwrap();
    vault.lock();

    assert!(matches!(
        vault.unlock_with_recovery(&stranger).unwrap_err(),
        VaultError::Authentication
    ));
    assert!(matches!(
        vault
            .unlock_with_recovery(&passkey("correct horse battery staple"))
            .unwrap_err(),
        VaultError::InvalidRecoveryPhrase
    ));
    assert_eq!(vault.state(), VaultState::Locked);

    vault.unlock_with_recovery(&phrase).unwrap();
    assert_eq!(vault.state(), VaultState::Unlocked);
}

#[test]
fn enabling_recovery_again_retires_the_old_phrase() {
    let (_store, vault) = memory_vault();
    let first = vault.enable_recovery().unwrap();
    let second = vault.enable_recovery().unwrap();
    assert_ne!(first.expose_secret(), second.expose_secret());
    vault.lock();

    assert!(matches!(
        vault.unlock_with_recovery(&first).unwrap_err(),
        VaultError::Authentication
    ));
    vault.unlock_with_recovery(&second).unwrap();
}

#[test]
fn enable_recovery_requires_unlocked() {
    let (store, vault) = memory_vault();
    vault.lock();
    assert!(vault.enable_recovery().unwrap_err().is_locked());
    assert!(store.load_key_record().unwrap().unwrap().recovery.is_none());
}
