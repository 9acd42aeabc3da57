// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for vaultlog integration tests.
//!
//! [`TestVault`] provisions a vault on a temporary SQLite file (or an
//! in-memory store) and offers raw-row helpers that tamper with storage
//! behind the vault's back, the way an attacker with disk access would.

pub mod harness;

pub use harness::{TestVault, TestVaultBuilder, TEST_PASSKEY};
