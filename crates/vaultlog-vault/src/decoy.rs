// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoy traffic: random events appended on a timer.
//!
//! Decoys go through [`Vault::append_event`] like any other event, so they
//! are encrypted and chained normally. They carry a reserved stream type;
//! nothing in the vault treats that stream differently.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, RngCore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use vaultlog_config::model::DecoyConfig;
use vaultlog_core::{EventRecord, VaultError};

use crate::vault::Vault;

pub struct DecoyWriter {
    vault: Arc<Vault>,
    interval: Duration,
    stream_type: String,
    payload_len: RangeInclusive<usize>,
}

impl DecoyWriter {
    pub fn new(
        vault: Arc<Vault>,
        interval: Duration,
        stream_type: impl Into<String>,
        payload_len: RangeInclusive<usize>,
    ) -> Self {
        Self {
            vault,
            interval,
            stream_type: stream_type.into(),
            payload_len,
        }
    }

    pub fn from_config(vault: Arc<Vault>, config: &DecoyConfig) -> Self {
        Self::new(
            vault,
            Duration::from_secs(config.interval_secs),
            config.stream_type.clone(),
            config.min_payload_len..=config.max_payload_len,
        )
    }

    /// Append one decoy. Returns `Ok(None)` when the vault is locked.
    pub fn write_once(&self) -> Result<Option<EventRecord>, VaultError> {
        let mut rng = rand::thread_rng();
        let len = if self.payload_len.is_empty() {
            *self.payload_len.start()
        } else {
            rng.gen_range(self.payload_len.clone())
        };
        let mut payload = vec![0u8; len];
        rng.fill_bytes(&mut payload);
        let mut id = [0u8; 8];
        rng.fill_bytes(&mut id);
        let stream_id = hex::encode(id);

        match self
            .vault
            .append_event(&self.stream_type, &stream_id, &payload)
        {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_locked() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Append a decoy every interval until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        let writer = Arc::new(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(writer.interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let this = Arc::clone(&writer);
                match tokio::task::spawn_blocking(move || this.write_once()).await {
                    Ok(Ok(Some(record))) => debug!(sequence_id = record.sequence_id, "decoy appended"),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => error!(error = %e, "decoy append failed"),
                    Err(e) => error!(error = %e, "decoy task panicked"),
                }
            }
            debug!("decoy writer stopped");
        })
    }
}
