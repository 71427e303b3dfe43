// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Vitrina platform.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for the
//! core tables: integrations, payments, wallets, conversations, message logs,
//! users, and the durable broker queue.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; `Database` IS the single writer. Query modules accept `&Database`
//! and call through `connection().call()`. Do NOT create additional
//! `Connection` instances for writes.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
