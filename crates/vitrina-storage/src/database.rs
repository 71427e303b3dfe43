// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use tracing::debug;
use vitrina_core::VitrinaError;

/// Convert a tokio-rusqlite error into VitrinaError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VitrinaError {
    VitrinaError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Wraps a single `tokio_rusqlite::Connection`; every query module accepts
/// `&Database` and calls through `connection().call()`, which serializes all
/// access on one background thread and eliminates SQLITE_BUSY under
/// concurrent load.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, VitrinaError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| VitrinaError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(|e| VitrinaError::Storage {
                source: Box::new(e),
            })?;

        debug!(path, "database open, migrations applied");

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the database, flushing the WAL.
    pub async fn close(self) -> Result<(), VitrinaError> {
        self.conn.close().await.map_err(|e| VitrinaError::Storage {
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for required in [
            "businesses",
            "conversations",
            "integrations",
            "message_logs",
            "payment_sync_logs",
            "payment_transactions",
            "queue",
            "users",
            "wallet_transactions",
            "wallets",
        ] {
            assert!(
                tables.iter().any(|t| t == required),
                "missing table {required}, have {tables:?}"
            );
        }

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open re-runs the migration runner as a no-op.
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }
}
