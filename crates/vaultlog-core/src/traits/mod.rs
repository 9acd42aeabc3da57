// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits implemented by persistence backends.

pub mod store;

pub use store::EventStore;
