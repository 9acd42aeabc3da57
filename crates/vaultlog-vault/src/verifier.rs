// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental background chain verification.
//!
//! [`IncrementalVerifier`] remembers the last `(sequence_id, chain_tag)` it
//! verified and replays only newer records on each pass, anchored on the
//! cached tag rather than on whatever is on disk now. A clean pass moves the
//! checkpoint forward; a pass with issues leaves it where it was. The
//! checkpoint is wiped by the kill switch.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use vaultlog_core::{ChainTag, VaultError, VerificationReport};

use crate::chain::ChainAnchor;
use crate::kill_switch::SecretHolder;
use crate::vault::Vault;

/// The last record a clean pass ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub sequence_id: u64,
    pub chain_tag: ChainTag,
}

pub struct IncrementalVerifier {
    vault: Arc<Vault>,
    checkpoint: Mutex<Option<Checkpoint>>,
}

impl IncrementalVerifier {
    /// Create a verifier and register it with the vault's kill switch.
    pub fn new(vault: Arc<Vault>) -> Arc<Self> {
        let verifier = Arc::new(Self {
            vault,
            checkpoint: Mutex::new(None),
        });
        let holder: Arc<dyn SecretHolder> = verifier.clone();
        verifier.vault.register_secret_holder(&holder);
        verifier
    }

    pub fn checkpoint(&self) -> Option<Checkpoint> {
        *self.checkpoint.lock()
    }

    /// Verify every record newer than the checkpoint.
    pub fn verify_new(&self) -> Result<VerificationReport, VaultError> {
        self.vault.ensure_unlocked()?;
        let Some(last) = self.vault.store().last()? else {
            return Ok(VerificationReport::new(&(1..=0)));
        };

        let started_from = self.checkpoint();
        let anchor = match started_from {
            Some(cp) => ChainAnchor::after(cp.sequence_id, cp.chain_tag),
            None => ChainAnchor::GENESIS,
        };
        let report = self.vault.verify_chain_from(anchor, last.sequence_id())?;

        if report.is_intact()
            && let (Some(sequence_id), Some(chain_tag)) =
                (report.last_sequence_id, report.last_chain_tag)
        {
            let mut checkpoint = self.checkpoint.lock();
            // Lost the race to a wipe or another pass: leave theirs.
            if *checkpoint == started_from {
                *checkpoint = Some(Checkpoint {
                    sequence_id,
                    chain_tag,
                });
            }
        }
        Ok(report)
    }

    /// Run [`verify_new`](Self::verify_new) every `interval` until cancelled.
    pub fn spawn_background(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let this = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || this.verify_new()).await {
                    Ok(Ok(report)) if report.is_intact() => {
                        debug!(checked = report.checked, "background verification pass clean");
                    }
                    Ok(Ok(report)) => {
                        warn!(
                            quarantined = ?report.quarantined_ids(),
                            "background verification quarantined records"
                        );
                    }
                    Ok(Err(e)) if e.is_locked() => {
                        debug!("background verification skipped, vault locked");
                    }
                    Ok(Err(e)) => error!(error = %e, "background verification failed"),
                    Err(e) => error!(error = %e, "background verification task panicked"),
                }
            }
            debug!("background verifier stopped");
        })
    }
}

impl SecretHolder for IncrementalVerifier {
    fn wipe(&self) {
        *self.checkpoint.lock() = None;
    }

    fn label(&self) -> &str {
        "incremental verifier"
    }
}
