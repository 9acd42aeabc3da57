// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, non-zero intervals, and ordered payload bounds.

use crate::diagnostic::ConfigError;
use crate::model::VaultlogConfig;

/// Shortest passkey length the config may allow.
const MIN_PASSKEY_FLOOR: usize = 8;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &VaultlogConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.vault.min_passkey_len < MIN_PASSKEY_FLOOR {
        fail(format!(
            "vault.min_passkey_len must be at least {MIN_PASSKEY_FLOOR}, got {}",
            config.vault.min_passkey_len
        ));
    }

    if config.kill_switch.budget_ms == 0 {
        fail("kill_switch.budget_ms must be greater than 0".to_string());
    }

    let decoy = &config.decoy;
    if decoy.interval_secs == 0 {
        fail("decoy.interval_secs must be greater than 0".to_string());
    }
    if decoy.stream_type.trim().is_empty() {
        fail("decoy.stream_type must not be empty".to_string());
    }
    if decoy.min_payload_len == 0 {
        fail("decoy.min_payload_len must be greater than 0".to_string());
    }
    if decoy.min_payload_len > decoy.max_payload_len {
        fail(format!(
            "decoy.min_payload_len ({}) must not exceed decoy.max_payload_len ({})",
            decoy.min_payload_len, decoy.max_payload_len
        ));
    }

    if config.verifier.interval_secs == 0 {
        fail("verifier.interval_secs must be greater than 0".to_string());
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = VaultlogConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = VaultlogConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn inverted_decoy_bounds_fail_validation() {
        let mut config = VaultlogConfig::default();
        config.decoy.min_payload_len = 512;
        config.decoy.max_payload_len = 128;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must not exceed"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = VaultlogConfig::default();
        config.kill_switch.budget_ms = 0;
        config.verifier.interval_secs = 0;
        config.vault.min_passkey_len = 2;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = VaultlogConfig::default();
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "logging.level"));
    }

    #[test]
    fn decoy_section_deserializes_with_defaults() {
        let toml_str = r#"
[decoy]
enabled = true
interval_secs = 30
"#;
        let config: VaultlogConfig = toml::from_str(toml_str).unwrap();
        assert!(config.decoy.enabled);
        assert_eq!(config.decoy.interval_secs, 30);
        assert_eq!(config.decoy.stream_type, "decoy");
        assert_eq!(config.decoy.max_payload_len, 1024);
    }

    #[test]
    fn kdf_knobs_are_not_configurable() {
        let toml_str = r#"
[vault]
kdf_memory_cost = 8192
"#;
        assert!(toml::from_str::<VaultlogConfig>(toml_str).is_err());
    }
}
