// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable broker queue operations.
//!
//! Delivery is at-least-once: an entry dequeued but never acked returns to
//! `pending` once its lock expires, so handlers must be idempotent.

use rusqlite::params;
use vitrina_core::VitrinaError;

use crate::database::{map_tr_err, Database};
use crate::models::QueueEntry;

/// Enqueue a payload on the named queue. Returns the entry id.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, VitrinaError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Dequeue the oldest pending entry from the named queue.
///
/// Atomically marks the entry `processing` with a 5-minute lock and bumps
/// its attempt counter. Returns `None` when the queue has no pending work.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, VitrinaError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, payload, status, attempts, max_attempts,
                            created_at, updated_at, locked_until
                     FROM queue
                     WHERE queue_name = ?1 AND status = 'pending'
                     ORDER BY id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name], map_row)
            };

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing',
                         attempts = attempts + 1,
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![entry.id],
                    )?;
                    tx.commit()?;

                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        attempts: entry.attempts + 1,
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful processing: the entry is marked `completed`.
pub async fn ack(db: &Database, id: i64) -> Result<(), VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed',
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Negative-acknowledge a queue entry after a handler error.
///
/// The entry returns to `pending` for redelivery unless it has exhausted
/// `max_attempts`, in which case it is parked as `failed`.
pub async fn nack(db: &Database, id: i64) -> Result<(), VitrinaError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i64, i64) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let next_status = if attempts >= max_attempts {
                "failed"
            } else {
                "pending"
            };
            conn.execute(
                "UPDATE queue SET status = ?1, locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![next_status, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Return entries stuck in `processing` past their lock deadline to
/// `pending` (crash recovery). Returns the number of reclaimed entries.
pub async fn reclaim_expired(db: &Database) -> Result<usize, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE queue SET status = 'pending', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'processing'
                   AND locked_until IS NOT NULL
                   AND locked_until <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                [],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of pending entries on the named queue.
pub async fn pending_count(db: &Database, queue_name: &str) -> Result<i64, VitrinaError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = 'pending'",
                params![queue_name],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

fn map_row(row: &rusqlite::Row<'_>) -> Result<QueueEntry, rusqlite::Error> {
    Ok(QueueEntry {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        locked_until: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn fifo_order_per_queue() {
        let (db, _dir) = setup_db().await;

        let first = enqueue(&db, "pay.requests", r#"{"n":1}"#).await.unwrap();
        let second = enqueue(&db, "pay.requests", r#"{"n":2}"#).await.unwrap();
        enqueue(&db, "pay.responses", r#"{"n":3}"#).await.unwrap();

        let a = dequeue(&db, "pay.requests").await.unwrap().unwrap();
        let b = dequeue(&db, "pay.requests").await.unwrap().unwrap();
        assert_eq!(a.id, first);
        assert_eq!(b.id, second);
        assert_eq!(a.status, "processing");
        assert_eq!(a.attempts, 1);

        // The other queue is unaffected.
        assert_eq!(pending_count(&db, "pay.responses").await.unwrap(), 1);
        assert!(dequeue(&db, "pay.requests").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_completes_entry() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "p").await.unwrap();
        dequeue(&db, "q").await.unwrap().unwrap();
        ack(&db, id).await.unwrap();

        let status: String = db
            .connection()
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT status FROM queue WHERE id = ?1", params![id], |r| {
                    r.get(0)
                })
            })
            .await
            .unwrap();
        assert_eq!(status, "completed");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn nack_redelivers_until_max_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "p").await.unwrap();

        // Attempts 1 and 2 fail and the entry returns to pending.
        for _ in 0..2 {
            dequeue(&db, "q").await.unwrap().unwrap();
            nack(&db, id).await.unwrap();
            assert_eq!(pending_count(&db, "q").await.unwrap(), 1);
        }

        // Attempt 3 fails and parks the entry.
        dequeue(&db, "q").await.unwrap().unwrap();
        nack(&db, id).await.unwrap();
        assert_eq!(pending_count(&db, "q").await.unwrap(), 0);

        let status: String = db
            .connection()
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.query_row("SELECT status FROM queue WHERE id = ?1", params![id], |r| {
                    r.get(0)
                })
            })
            .await
            .unwrap();
        assert_eq!(status, "failed");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reclaim_returns_expired_locks_to_pending() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "p").await.unwrap();
        dequeue(&db, "q").await.unwrap().unwrap();

        // Force the lock into the past.
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE queue SET locked_until = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(reclaim_expired(&db).await.unwrap(), 1);
        assert_eq!(pending_count(&db, "q").await.unwrap(), 1);
        db.close().await.unwrap();
    }
}
