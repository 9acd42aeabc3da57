// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vaultlog.toml` > `~/.config/vaultlog/vaultlog.toml` > `/etc/vaultlog/vaultlog.toml`
//! with environment variable overrides via `VAULTLOG_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VaultlogConfig;

/// Config sections addressable from the environment.
///
/// `kill_switch` must come before any section whose name is a prefix of it.
const ENV_SECTIONS: &[&str] = &[
    "kill_switch",
    "storage",
    "vault",
    "decoy",
    "verifier",
    "logging",
];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/vaultlog/vaultlog.toml";

/// Local config file, relative to the working directory.
pub const LOCAL_CONFIG_FILE: &str = "vaultlog.toml";

/// The per-user config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vaultlog/vaultlog.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vaultlog/vaultlog.toml` (system-wide)
/// 3. `~/.config/vaultlog/vaultlog.toml` (user XDG config)
/// 4. `./vaultlog.toml` (local directory)
/// 5. `VAULTLOG_*` environment variables
pub fn load_config() -> Result<VaultlogConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<VaultlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VaultlogConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VaultlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VaultlogConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VaultlogConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses an explicit `map()` rather than `Env::split("_")`, since both section
/// and key names contain underscores: `VAULTLOG_KILL_SWITCH_BUDGET_MS` must
/// become `kill_switch.budget_ms`. The passkey and recovery-phrase variables
/// are not config keys and are filtered out.
fn env_provider() -> Env {
    Env::prefixed("VAULTLOG_")
        .ignore(&["passkey", "new_passkey", "recovery_phrase"])
        .map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("kill_switch_budget_ms"), "kill_switch.budget_ms");
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("decoy_stream_type"), "decoy.stream_type");
        assert_eq!(map_env_key("vault_min_passkey_len"), "vault.min_passkey_len");
    }

    #[test]
    fn unknown_env_key_passes_through() {
        assert_eq!(map_env_key("bogus"), "bogus");
    }
}
