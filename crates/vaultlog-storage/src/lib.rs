// SPDX-FileCopyrightText: 2026 Vaultlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event store backends for vaultlog.
//!
//! [`SqliteEventStore`] is the durable backend: WAL-mode SQLite with embedded
//! migrations and a single connection that is dropped on release and reopened
//! lazily. [`MemoryEventStore`] keeps everything in a `BTreeMap` and exposes
//! raw mutation hooks for tamper and deletion scenarios. [`snapshot`] takes
//! consistent file copies for backup and restore.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod snapshot;
pub mod sqlite;

pub use database::Database;
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
