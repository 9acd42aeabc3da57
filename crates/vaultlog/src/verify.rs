// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultlog verify` command implementation.

use std::process::ExitCode;

use vaultlog_config::model::VaultlogConfig;
use vaultlog_core::{VaultError, VerificationReport};

use crate::{exit, session};

/// Replay `from..=to` (to the newest record when `to` is `None`).
///
/// Exits with the integrity code if any record was quarantined by this pass.
pub fn run_verify(
    config: &VaultlogConfig,
    from: u64,
    to: Option<u64>,
    json: bool,
) -> Result<ExitCode, VaultError> {
    let vault = session::unlocked_vault(config)?;
    let result = vault.verify_chain(from..=to.unwrap_or(u64::MAX));
    vault.lock();
    let report = result?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| VaultError::Internal(format!("failed to render report: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", render_report(&report));
    }

    if report.is_intact() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(exit::INTEGRITY))
    }
}

fn render_report(report: &VerificationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "checked {} event(s), {} verified, {} quarantined\n",
        report.checked,
        report.verified,
        report.issues.len()
    ));
    for issue in &report.issues {
        out.push_str(&format!("  #{}: {}", issue.sequence_id, issue.reason));
        if let Some(missing) = issue.expected_sequence_id {
            out.push_str(&format!(" (missing from #{missing})"));
        }
        out.push('\n');
    }
    if !report.previously_quarantined.is_empty() {
        out.push_str(&format!(
            "  already quarantined: {:?}\n",
            report.previously_quarantined
        ));
    }
    out
}
