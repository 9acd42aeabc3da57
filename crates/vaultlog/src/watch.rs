// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog watch` command implementation.
//!
//! Holds the vault unlocked, runs the incremental verifier and (when
//! enabled) the decoy writer until Ctrl-C. On Unix, SIGUSR1 fires the kill
//! switch and exits.

use std::process::ExitCode;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;
use vaultlog_vault::{DecoyWriter, IncrementalVerifier};

use crate::session;

pub async fn run_watch(config: &VaultlogConfig) -> Result<ExitCode, VaultError> {
    let vault = session::unlocked_vault(config)?;
    let cancel = CancellationToken::new();

    let verifier = IncrementalVerifier::new(vault.clone());
    let mut tasks = vec![verifier.spawn_background(
        Duration::from_secs(config.verifier.interval_secs),
        cancel.clone(),
    )];
    if config.decoy.enabled {
        tasks.push(DecoyWriter::from_config(vault.clone(), &config.decoy).spawn(cancel.clone()));
    }
    info!(decoys = config.decoy.enabled, "watching vault");

    let kill = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.map_err(|e| VaultError::Internal(format!("failed to wait for Ctrl-C: {e}")))?;
            false
        }
        res = kill_signal() => {
            res?;
            true
        }
    };

    if kill {
        let outcome = vault.panic();
        warn!(
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            holders_wiped = outcome.holders_wiped,
            "kill switch triggered by signal"
        );
    }

    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    vault.lock();
    info!("watch stopped");
    Ok(ExitCode::SUCCESS)
}

#[cfg(unix)]
async fn kill_signal() -> Result<(), VaultError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())
        .map_err(|e| VaultError::Internal(format!("failed to install SIGUSR1 handler: {e}")))?;
    usr1.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn kill_signal() -> Result<(), VaultError> {
    std::future::pending().await
}
