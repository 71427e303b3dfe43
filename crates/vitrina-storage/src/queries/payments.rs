// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment transaction and sync-log persistence.
//!
//! Invariant: at most one sync log per transaction is `processing` at any
//! instant. The orchestrator enforces it by cancelling processing logs before
//! inserting a fresh one; `processing_log` is the check side of the pair.

use rusqlite::params;
use vitrina_core::{PaymentStatus, SyncLogStatus, VitrinaError};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_column, PaymentSyncLog, PaymentTransaction};

/// Fields for a new payment transaction.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub business_id: i64,
    pub amount: f64,
    pub currency: String,
    pub gateway_code: String,
    pub reference: String,
    pub payment_method: String,
    pub description: String,
    pub callback_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Insert a new transaction in `pending` status.
pub async fn insert(db: &Database, new: NewPayment) -> Result<PaymentTransaction, VitrinaError> {
    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO payment_transactions
                 (business_id, amount, currency, gateway_code, reference, payment_method,
                  status, description, callback_url, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9)",
                params![
                    new.business_id,
                    new.amount,
                    new.currency,
                    new.gateway_code,
                    new.reference,
                    new.payment_method,
                    new.description,
                    new.callback_url,
                    new.metadata.map(|m| m.to_string()),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    get(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted payment vanished".to_string()))
}

/// Get a transaction by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<PaymentTransaction>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(&format!("{TX_COLS} WHERE id = ?1"), params![id], map_tx);
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Transactions for one business, newest first, with a total count.
/// Pages are 1-based; page 1 and below return the newest rows.
pub async fn list_by_business(
    db: &Database,
    business_id: i64,
    page: i64,
    page_size: i64,
) -> Result<(Vec<PaymentTransaction>, i64), VitrinaError> {
    db.connection()
        .call(move |conn| {
            let page_size = page_size.clamp(1, 100);
            let offset = (page - 1).max(0) * page_size;

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM payment_transactions WHERE business_id = ?1",
                params![business_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "{TX_COLS} WHERE business_id = ?1
                 ORDER BY id DESC LIMIT {page_size} OFFSET {offset}"
            ))?;
            let rows = stmt.query_map(params![business_id], map_tx)?;
            let items: Result<Vec<_>, _> = rows.collect();
            Ok((items?, total))
        })
        .await
        .map_err(map_tr_err)
}

/// Set the transaction status. Returns false when the id does not exist.
pub async fn set_status(
    db: &Database,
    id: i64,
    status: PaymentStatus,
) -> Result<bool, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE payment_transactions SET status = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a transaction `completed`.
///
/// The external id is assigned only when not already set, so a duplicate
/// success response cannot overwrite the gateway's identifier.
pub async fn complete(
    db: &Database,
    id: i64,
    external_id: Option<String>,
) -> Result<bool, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE payment_transactions SET status = 'completed',
                 external_id = COALESCE(external_id, ?1),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![external_id, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a sync log for one processing attempt.
pub async fn insert_sync_log(
    db: &Database,
    payment_transaction_id: i64,
    status: SyncLogStatus,
    retry_count: i64,
) -> Result<PaymentSyncLog, VitrinaError> {
    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO payment_sync_logs (payment_transaction_id, status, retry_count)
                 VALUES (?1, ?2, ?3)",
                params![payment_transaction_id, status.to_string(), retry_count],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    get_sync_log(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted sync log vanished".to_string()))
}

/// Get one sync log.
pub async fn get_sync_log(db: &Database, id: i64) -> Result<Option<PaymentSyncLog>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(&format!("{LOG_COLS} WHERE id = ?1"), params![id], map_log);
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent `processing` sync log for a transaction, if any.
pub async fn processing_log(
    db: &Database,
    payment_transaction_id: i64,
) -> Result<Option<PaymentSyncLog>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "{LOG_COLS}
                     WHERE payment_transaction_id = ?1 AND status = 'processing'
                     ORDER BY id DESC LIMIT 1"
                ),
                params![payment_transaction_id],
                map_log,
            );
            optional(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a sync log's status, error message, and next retry time.
pub async fn mark_sync_log(
    db: &Database,
    id: i64,
    status: SyncLogStatus,
    error_message: Option<String>,
    next_retry_at: Option<String>,
) -> Result<(), VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE payment_sync_logs SET status = ?1, error_message = ?2,
                 next_retry_at = ?3,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?4",
                params![status.to_string(), error_message, next_retry_at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Cancel all `processing` logs of a transaction. Returns how many.
pub async fn cancel_processing_logs(
    db: &Database,
    payment_transaction_id: i64,
) -> Result<usize, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE payment_sync_logs SET status = 'cancelled',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE payment_transaction_id = ?1 AND status = 'processing'",
                params![payment_transaction_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Total number of attempts (sync logs) recorded for a transaction.
pub async fn attempt_count(
    db: &Database,
    payment_transaction_id: i64,
) -> Result<i64, VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM payment_sync_logs WHERE payment_transaction_id = ?1",
                params![payment_transaction_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// All sync logs of a transaction, oldest first.
pub async fn sync_logs_for(
    db: &Database,
    payment_transaction_id: i64,
) -> Result<Vec<PaymentSyncLog>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{LOG_COLS} WHERE payment_transaction_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![payment_transaction_id], map_log)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Failed sync logs due for retry: `retry_count < max_retries` and
/// `next_retry_at <= now`, oldest first, capped at `limit`.
pub async fn due_retry_logs(
    db: &Database,
    max_retries: i64,
    now: &str,
    limit: i64,
) -> Result<Vec<PaymentSyncLog>, VitrinaError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{LOG_COLS}
                 WHERE status = 'failed' AND retry_count < ?1
                   AND next_retry_at IS NOT NULL AND next_retry_at <= ?2
                 ORDER BY next_retry_at ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![max_retries, now, limit], map_log)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

const TX_COLS: &str = "SELECT id, business_id, amount, currency, gateway_code, reference,
        payment_method, status, external_id, description, callback_url, metadata,
        created_at, updated_at
 FROM payment_transactions";

const LOG_COLS: &str = "SELECT id, payment_transaction_id, status, retry_count, error_message,
        next_retry_at, created_at, updated_at
 FROM payment_sync_logs";

fn map_tx(row: &rusqlite::Row<'_>) -> Result<PaymentTransaction, rusqlite::Error> {
    let metadata: Option<String> = row.get(11)?;
    let metadata = metadata
        .map(|m| {
            serde_json::from_str(&m).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;
    Ok(PaymentTransaction {
        id: row.get(0)?,
        business_id: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        gateway_code: row.get(4)?,
        reference: row.get(5)?,
        payment_method: row.get(6)?,
        status: parse_column(7, row.get(7)?)?,
        external_id: row.get(8)?,
        description: row.get(9)?,
        callback_url: row.get(10)?,
        metadata,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn map_log(row: &rusqlite::Row<'_>) -> Result<PaymentSyncLog, rusqlite::Error> {
    Ok(PaymentSyncLog {
        id: row.get(0)?,
        payment_transaction_id: row.get(1)?,
        status: parse_column(2, row.get(2)?)?,
        retry_count: row.get(3)?,
        error_message: row.get(4)?,
        next_retry_at: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn optional<T>(result: Result<T, rusqlite::Error>) -> Result<Option<T>, rusqlite::Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
