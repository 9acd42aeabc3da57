// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for vaultlog.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.
//!
//! There are no Argon2id knobs here. The KDF profile is fixed in code and a
//! persisted record that deviates from it is rejected at unlock.

use serde::{Deserialize, Serialize};

/// Top-level vaultlog configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultlogConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vault boundary settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Emergency key destruction settings.
    #[serde(default)]
    pub kill_switch: KillSwitchConfig,

    /// Decoy traffic writer settings.
    #[serde(default)]
    pub decoy: DecoyConfig,

    /// Background chain verifier settings.
    #[serde(default)]
    pub verifier: VerifierConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// How long SQLite waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("vaultlog").join("vaultlog.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vaultlog.db"))
        .display()
        .to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Vault boundary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Minimum passkey length accepted when provisioning or rotating.
    #[serde(default = "default_min_passkey_len")]
    pub min_passkey_len: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            min_passkey_len: default_min_passkey_len(),
        }
    }
}

fn default_min_passkey_len() -> usize {
    12
}

/// Kill switch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KillSwitchConfig {
    /// Time budget for a trigger, in milliseconds. Overruns are logged.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self {
            budget_ms: default_budget_ms(),
        }
    }
}

fn default_budget_ms() -> u64 {
    250
}

/// Decoy writer configuration.
///
/// Decoy events go through the normal append path under a reserved stream
/// type; the vault core does not treat them specially.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecoyConfig {
    /// Whether the decoy writer runs.
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between decoy appends.
    #[serde(default = "default_decoy_interval_secs")]
    pub interval_secs: u64,

    /// Stream type used for decoy events.
    #[serde(default = "default_decoy_stream_type")]
    pub stream_type: String,

    /// Smallest random payload length in bytes.
    #[serde(default = "default_decoy_min_payload_len")]
    pub min_payload_len: usize,

    /// Largest random payload length in bytes.
    #[serde(default = "default_decoy_max_payload_len")]
    pub max_payload_len: usize,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_decoy_interval_secs(),
            stream_type: default_decoy_stream_type(),
            min_payload_len: default_decoy_min_payload_len(),
            max_payload_len: default_decoy_max_payload_len(),
        }
    }
}

fn default_decoy_interval_secs() -> u64 {
    300
}

fn default_decoy_stream_type() -> String {
    "decoy".to_string()
}

fn default_decoy_min_payload_len() -> usize {
    64
}

fn default_decoy_max_payload_len() -> usize {
    1024
}

/// Background chain verifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// Seconds between incremental verification passes.
    #[serde(default = "default_verifier_interval_secs")]
    pub interval_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_verifier_interval_secs(),
        }
    }
}

fn default_verifier_interval_secs() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
