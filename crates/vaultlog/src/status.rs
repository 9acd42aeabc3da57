// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog status` command implementation.
//!
//! Reports what can be learned without the passkey: whether a vault exists,
//! its KDF profile, whether a recovery phrase is set, and where the chain
//! ends.

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::{EventStore, VaultError};

use crate::{exit, session};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub provisioned: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub kdf: Option<String>,
    pub recovery_enabled: bool,
    pub last_sequence_id: Option<u64>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl StatusResponse {
    fn not_provisioned(database_path: &str) -> Self {
        Self {
            database_path: database_path.to_string(),
            provisioned: false,
            created_at: None,
            kdf: None,
            recovery_enabled: false,
            last_sequence_id: None,
            last_event_at: None,
        }
    }
}

/// Gather status from the store without unlocking.
pub fn collect_status(
    database_path: &str,
    store: &dyn EventStore,
) -> Result<StatusResponse, VaultError> {
    let Some(record) = store.load_key_record()? else {
        return Ok(StatusResponse::not_provisioned(database_path));
    };
    let last = store.last()?;
    Ok(StatusResponse {
        database_path: database_path.to_string(),
        provisioned: true,
        created_at: Some(record.created_at),
        kdf: Some(record.kdf_params.to_string()),
        recovery_enabled: record.recovery.is_some(),
        last_sequence_id: last.as_ref().map(|stored| stored.sequence_id()),
        // An undecodable newest row has no trustworthy timestamp.
        last_event_at: last
            .as_ref()
            .and_then(|stored| stored.record())
            .map(|r| r.timestamp),
    })
}

/// Run the `vaultlog status` command.
///
/// Exits with the not-provisioned code when no vault exists, so scripts
/// can branch on it.
pub fn run_status(config: &VaultlogConfig, json: bool) -> Result<ExitCode, VaultError> {
    let path = &config.storage.database_path;
    let status = match session::open_vault(config) {
        Ok(vault) => collect_status(path, vault.store().as_ref())?,
        Err(VaultError::NotProvisioned) => StatusResponse::not_provisioned(path),
        Err(e) => return Err(e),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| VaultError::Internal(format!("failed to render status: {e}")))?;
        println!("{rendered}");
    } else {
        print_status(&status);
    }

    if status.provisioned {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(exit::NOT_PROVISIONED))
    }
}

fn print_status(status: &StatusResponse) {
    println!();
    println!("  vaultlog status");
    println!("  {}", "-".repeat(35));
    println!("    Database:    {}", status.database_path);

    if !status.provisioned {
        println!("    Vault:       [--] not provisioned");
        println!();
        println!("  Create one with: vaultlog init");
        println!();
        return;
    }

    println!("    Vault:       [OK] provisioned");
    if let Some(created_at) = status.created_at {
        println!("    Created:     {}", created_at.to_rfc3339());
    }
    if let Some(kdf) = &status.kdf {
        println!("    KDF:         argon2id {kdf}");
    }
    if status.recovery_enabled {
        println!("    Recovery:    [OK] phrase set");
    } else {
        println!("    Recovery:    [--] none (vaultlog recovery)");
    }
    match (status.last_sequence_id, status.last_event_at) {
        (Some(seq), Some(at)) => {
            println!("    Last event:  #{seq} at {}", at.to_rfc3339());
        }
        _ => println!("    Last event:  none"),
    }
    println!();
}
