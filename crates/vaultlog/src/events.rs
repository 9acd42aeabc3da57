// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog append` and `vaultlog read` command implementations.

use std::io::{Read, Write};
use std::process::ExitCode;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::VaultError;

use crate::session;

/// Append one event. Without `data`, the payload is all of stdin.
pub fn run_append(
    config: &VaultlogConfig,
    stream_type: &str,
    stream_id: &str,
    data: Option<String>,
) -> Result<ExitCode, VaultError> {
    let payload = match data {
        Some(data) => data.into_bytes(),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| VaultError::Internal(format!("failed to read stdin: {e}")))?;
            buf
        }
    };

    let vault = session::unlocked_vault(config)?;
    let result = vault.append_event(stream_type, stream_id, &payload);
    vault.lock();
    let record = result?;

    println!("{}", record.sequence_id);
    Ok(ExitCode::SUCCESS)
}

/// Decrypt one event and write the raw payload to stdout.
pub fn run_read(config: &VaultlogConfig, sequence_id: u64) -> Result<ExitCode, VaultError> {
    let vault = session::unlocked_vault(config)?;
    let result = vault.read_event(sequence_id);
    vault.lock();
    let plaintext = result?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&plaintext)
        .and_then(|()| stdout.flush())
        .map_err(|e| VaultError::Internal(format!("failed to write stdout: {e}")))?;
    Ok(ExitCode::SUCCESS)
}
