// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics.
//!
//! Every vaultlog setting has a default, so the failures a user can actually
//! hit are a misspelled key, a value of the wrong type, or a value that
//! fails validation. Misspellings get a "did you mean" from Jaro-Winkler
//! similarity against the keys of the same table.

#![allow(unused_assignments)] // emitted by the miette Diagnostic derive

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Below this Jaro-Winkler score a key is not offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or table that no vaultlog setting is called.
    #[error("unknown key `{key}` in {}", table_name(table))]
    #[diagnostic(
        code(vaultlog::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), table, valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Owning table, empty for the top level.
        table: String,
        suggestion: Option<String>,
        /// Comma-separated keys the table accepts.
        valid_keys: String,
        #[label("not a vaultlog setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into its setting's type.
    #[error("`{key}` must be {expected}, found {found}")]
    #[diagnostic(code(vaultlog::config::invalid_type))]
    InvalidType {
        /// Dotted path, e.g. `kill_switch.budget_ms`.
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A well-typed value rejected by [`crate::validation`].
    #[error("{message}")]
    #[diagnostic(code(vaultlog::config::validation))]
    Validation { message: String },

    /// Unreadable TOML and anything else figment reports.
    #[error("{0}")]
    #[diagnostic(code(vaultlog::config::load))]
    Other(String),
}

fn table_name(table: &str) -> String {
    if table.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{table}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, table: &str, valid_keys: &str) -> String {
    let accepted = format!("{} accepts: {valid_keys}", table_name(table));
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {accepted}"),
        None => accepted,
    }
}

/// Convert a `figment::Error`, which may hold several errors, into diagnostics.
///
/// `toml_sources` pairs file paths with their contents so that errors coming
/// from a file can point at the offending line.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        table: path.join("."),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(found, expected) => {
                    let (span, src) = match path.split_last() {
                        Some((field, table)) => locate(&error, table, field, toml_sources),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Span of `field` inside `table` when the error came from one of the files.
fn locate(
    error: &figment::Error,
    table: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(file)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let file = file.display().to_string();
    toml_sources
        .iter()
        .find(|(path, _)| *path == file)
        .and_then(|(path, content)| {
            let offset = find_key_offset(content, table, field)?;
            Some((
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.clone())),
            ))
        })
        .unwrap_or((None, None))
}

/// Byte offset of `field = ...` inside the `[table]` of `content`.
///
/// An empty `table` searches the top level, which ends at the first header.
/// Only single-level tables are looked up; vaultlog has no nested ones.
pub fn find_key_offset(content: &str, table: &[String], field: &str) -> Option<usize> {
    let start = match table.first() {
        None => 0,
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    let mut past_top_level = false;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            if !table.is_empty() {
                return None;
            }
            // At the top level an unknown table is reported by its header.
            if header.strip_prefix(field).is_some_and(|rest| rest.starts_with(']')) {
                return Some(offset + indent + 1);
            }
            past_top_level = true;
        } else if !past_top_level
            && let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// The accepted key closest to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("vaultlog: config error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    #[test]
    fn typo_gets_the_closest_key() {
        let decoy = &[
            "enabled",
            "interval_secs",
            "stream_type",
            "min_payload_len",
            "max_payload_len",
        ];
        assert_eq!(suggest_key("intervl_secs", decoy), Some("interval_secs".to_string()));
        assert_eq!(suggest_key("budjet_ms", &["budget_ms"]), Some("budget_ms".to_string()));
        assert_eq!(suggest_key("zzzzzz", &["database_path", "busy_timeout_ms"]), None);
    }

    #[test]
    fn key_is_found_inside_its_own_table_only() {
        let content = "[storage]\nbusy_timeout_ms = 10\n\n[verifier]\n  interval_secs = 5\n";
        let o = find_key_offset(content, &table("verifier"), "interval_secs").unwrap();
        assert_eq!(&content[o..o + 13], "interval_secs");
        assert!(find_key_offset(content, &table("storage"), "interval_secs").is_none());
        assert!(find_key_offset(content, &table("decoy"), "enabled").is_none());
    }

    #[test]
    fn unknown_top_level_table_points_at_its_header() {
        let content = "[storage]\nbusy_timeout_ms = 10\n\n[decoys]\nenabled = true\n";
        let o = find_key_offset(content, &[], "decoys").unwrap();
        assert_eq!(&content[o..o + 6], "decoys");
    }

    #[test]
    fn unknown_key_help_names_the_table() {
        assert_eq!(
            unknown_key_help(Some("budget_ms"), "kill_switch", "budget_ms"),
            "did you mean `budget_ms`? [kill_switch] accepts: budget_ms"
        );
        assert_eq!(
            unknown_key_help(None, "", "storage, vault"),
            "the top level accepts: storage, vault"
        );
    }
}
