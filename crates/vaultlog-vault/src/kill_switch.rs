// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emergency destruction of in-memory secrets.
//!
//! [`KillSwitch::trigger`] forces the [`VaultContext`] into `PANIC`, then
//! wipes every registered [`SecretHolder`]. Holders are kept as `Weak`
//! references, so registering never extends a holder's lifetime. The trigger
//! does no I/O; releasing the store handle is left to the caller, which the
//! returned [`KillOutcome`] reminds it to do.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::context::VaultContext;

/// Anything besides the vault context that caches secret-derived state.
pub trait SecretHolder: Send + Sync {
    /// Overwrite or drop the held material. Must not block on I/O.
    fn wipe(&self);

    /// Short label for logs.
    fn label(&self) -> &str {
        "secret holder"
    }
}

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillOutcome {
    /// Live holders that were wiped.
    pub holders_wiped: usize,
    /// Holders whose `wipe` panicked. The trigger carried on past them.
    pub holders_failed: usize,
    pub elapsed: Duration,
    pub over_budget: bool,
    /// The caller must now release its durable store handle.
    pub release_store: bool,
}

pub struct KillSwitch {
    context: Arc<VaultContext>,
    holders: Mutex<Vec<Weak<dyn SecretHolder>>>,
    budget: Duration,
}

impl KillSwitch {
    pub fn new(context: Arc<VaultContext>, budget: Duration) -> Self {
        Self {
            context,
            holders: Mutex::new(Vec::new()),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Register a holder to be wiped on trigger.
    pub fn register(&self, holder: &Arc<dyn SecretHolder>) {
        let mut holders = self.holders.lock();
        holders.retain(|h| h.strong_count() > 0);
        holders.push(Arc::downgrade(holder));
    }

    /// Number of registered holders still alive.
    pub fn live_holders(&self) -> usize {
        self.holders.lock().iter().filter(|h| h.strong_count() > 0).count()
    }

    /// Panic the context and wipe every live holder.
    pub fn trigger(&self) -> KillOutcome {
        let started = Instant::now();
        self.context.panic();

        let live: Vec<Arc<dyn SecretHolder>> = {
            let mut holders = self.holders.lock();
            holders.retain(|h| h.strong_count() > 0);
            holders.iter().filter_map(Weak::upgrade).collect()
        };

        let mut holders_wiped = 0;
        let mut holders_failed = 0;
        for holder in &live {
            match catch_unwind(AssertUnwindSafe(|| holder.wipe())) {
                Ok(()) => holders_wiped += 1,
                Err(_) => {
                    holders_failed += 1;
                    warn!(holder = holder.label(), "secret holder panicked during wipe");
                }
            }
        }

        let elapsed = started.elapsed();
        let over_budget = elapsed > self.budget;
        if over_budget {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.budget.as_millis() as u64,
                "kill switch exceeded its time budget"
            );
        }
        info!(holders_wiped, holders_failed, "kill switch triggered");

        KillOutcome {
            holders_wiped,
            holders_failed,
            elapsed,
            over_budget,
            release_store: true,
        }
    }
}
