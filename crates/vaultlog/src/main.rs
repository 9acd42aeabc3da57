// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! vaultlog - encrypted, hash-chained event log.
//!
//! This is the binary entry point.

mod backup;
mod events;
mod init;
mod recovery;
mod rekey;
mod session;
mod status;
mod verify;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use vaultlog_core::VaultError;

/// Exit codes beyond success and generic failure.
pub mod exit {
    pub const FAILURE: u8 = 1;
    pub const LOCKED: u8 = 3;
    pub const NOT_PROVISIONED: u8 = 4;
    pub const INTEGRITY: u8 = 5;
    pub const CONFIG: u8 = 6;
    pub const AUTHENTICATION: u8 = 7;
}

/// vaultlog - encrypted, hash-chained event log.
#[derive(Parser, Debug)]
#[command(name = "vaultlog", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision a new vault under a passkey.
    Init,
    /// Show whether a vault exists and where its chain ends.
    Status {
        /// Print JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// Encrypt and append one event. The payload is read from stdin unless --data is given.
    Append {
        #[arg(long, default_value = "event")]
        stream_type: String,
        #[arg(long)]
        stream_id: String,
        #[arg(long)]
        data: Option<String>,
    },
    /// Decrypt one event and write its payload to stdout.
    Read { sequence_id: u64 },
    /// Replay the chain and quarantine records that fail.
    Verify {
        #[arg(long, default_value_t = 1)]
        from: u64,
        #[arg(long)]
        to: Option<u64>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-wrap the vault key under a new passkey.
    Rekey,
    /// Create a 24-word recovery phrase, replacing any earlier one.
    Recovery,
    /// Set a new passkey using the recovery phrase.
    Recover,
    /// Write an encrypted snapshot of the vault database.
    Backup {
        /// Where to write the backup file.
        path: PathBuf,
    },
    /// Replace the vault database with a backup, keeping the old one aside.
    Restore {
        /// The backup file to restore from.
        path: PathBuf,
    },
    /// Keep the vault unlocked, verifying new events and writing decoys.
    ///
    /// On Unix, SIGUSR1 triggers the kill switch.
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => vaultlog_config::load_and_validate_path(path),
        None => vaultlog_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            vaultlog_config::render_errors(&errors);
            return ExitCode::from(exit::CONFIG);
        }
    };
    init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Init => init::run_init(&config),
        Commands::Status { json } => status::run_status(&config, json),
        Commands::Append {
            stream_type,
            stream_id,
            data,
        } => events::run_append(&config, &stream_type, &stream_id, data),
        Commands::Read { sequence_id } => events::run_read(&config, sequence_id),
        Commands::Verify { from, to, json } => verify::run_verify(&config, from, to, json),
        Commands::Rekey => rekey::run_rekey(&config),
        Commands::Recovery => recovery::run_recovery(&config),
        Commands::Recover => recovery::run_recover(&config),
        Commands::Backup { path } => backup::run_backup(&config, &path),
        Commands::Restore { path } => backup::run_restore(&config, &path),
        Commands::Watch => watch::run_watch(&config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map an error to the process exit code.
fn exit_code(err: &VaultError) -> u8 {
    match err {
        VaultError::Locked { .. } => exit::LOCKED,
        VaultError::NotProvisioned => exit::NOT_PROVISIONED,
        VaultError::ChainIntegrity { .. } => exit::INTEGRITY,
        VaultError::Config(_) => exit::CONFIG,
        VaultError::Authentication | VaultError::InvalidRecoveryPhrase => exit::AUTHENTICATION,
        _ => exit::FAILURE,
    }
}

fn report_error(err: &VaultError) {
    eprintln!("vaultlog: error [{}]: {err}", err.code());
    match err {
        VaultError::Locked { .. } => {
            eprintln!("  hint: the vault must be unlocked; provide the passkey and retry");
        }
        VaultError::NotProvisioned => {
            eprintln!("  hint: no vault exists at this database path; run `vaultlog init`");
        }
        VaultError::RecoveryNotEnabled => {
            eprintln!("  hint: create one with `vaultlog recovery` while the passkey still works");
        }
        VaultError::InvalidBackup(_) => {
            eprintln!("  hint: pass a file written by `vaultlog backup`");
        }
        VaultError::KeyDerivation(_) => {
            eprintln!("  hint: key derivation ran out of memory; retry when the system is less loaded");
        }
        _ => {}
    }
}

/// Initialize the tracing subscriber on stderr, leaving stdout for payloads.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vaultlog={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
