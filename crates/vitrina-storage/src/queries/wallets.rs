// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet and ledger persistence.
//!
//! Invariant: `wallet.balance` equals the signed sum of COMPLETED ledger rows
//! (+RECHARGE, -USAGE). Every operation that moves a row to COMPLETED updates
//! the balance in the same SQLite transaction, so readers never observe the
//! pair half-applied.

use rusqlite::params;
use vitrina_core::{VitrinaError, WalletTransactionStatus, WalletTransactionType};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_column, Wallet, WalletTransaction};

/// Get the wallet for a business, creating it at balance 0 on first read.
pub async fn get_or_create(db: &Database, business_id: i64) -> Result<Wallet, VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO wallets (business_id) VALUES (?1)",
                params![business_id],
            )?;
            conn.query_row(
                &format!("{WALLET_COLS} WHERE business_id = ?1"),
                params![business_id],
                map_wallet,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// All wallets, for the admin overview.
pub async fn list_all(db: &Database) -> Result<Vec<Wallet>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!("{WALLET_COLS} ORDER BY business_id ASC"))?;
            let rows = stmt.query_map([], map_wallet)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Fields for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub wallet_id: i64,
    pub business_id: i64,
    pub tx_type: WalletTransactionType,
    pub status: WalletTransactionStatus,
    pub amount: f64,
    pub reference: String,
    pub channel: String,
    pub tracking_number: Option<String>,
}

/// Insert a ledger row without touching the balance (recharge request path).
pub async fn insert_transaction(
    db: &Database,
    new: NewWalletTransaction,
) -> Result<WalletTransaction, VitrinaError> {
    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO wallet_transactions
                 (wallet_id, business_id, tx_type, status, amount, reference, channel,
                  tracking_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.wallet_id,
                    new.business_id,
                    new.tx_type.to_string(),
                    new.status.to_string(),
                    new.amount,
                    new.reference,
                    new.channel,
                    new.tracking_number,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;

    get_transaction(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted wallet transaction vanished".to_string()))
}

/// Get one ledger row.
pub async fn get_transaction(
    db: &Database,
    id: i64,
) -> Result<Option<WalletTransaction>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("{TX_COLS} WHERE id = ?1"),
                params![id],
                map_transaction,
            );
            match result {
                Ok(tx) => Ok(Some(tx)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome of a settle (approve/reject) attempt.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// Row updated; carries the refreshed transaction.
    Applied(WalletTransaction),
    /// Row exists but was not PENDING.
    NotPending(WalletTransactionStatus),
    /// No such row.
    Missing,
}

/// Approve or reject a PENDING ledger row.
///
/// Approval moves the row to COMPLETED and credits the wallet atomically;
/// rejection moves it to FAILED and leaves the balance alone.
pub async fn settle_transaction(
    db: &Database,
    tx_id: i64,
    approve: bool,
) -> Result<SettleOutcome, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let dbtx = conn.transaction()?;

            let row = {
                let result = dbtx.query_row(
                    &format!("{TX_COLS} WHERE id = ?1"),
                    params![tx_id],
                    map_transaction,
                );
                match result {
                    Ok(tx) => tx,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        dbtx.commit()?;
                        return Ok(SettleOutcome::Missing);
                    }
                    Err(e) => return Err(e),
                }
            };

            if row.status != WalletTransactionStatus::Pending {
                dbtx.commit()?;
                return Ok(SettleOutcome::NotPending(row.status));
            }

            let new_status = if approve {
                WalletTransactionStatus::Completed
            } else {
                WalletTransactionStatus::Failed
            };
            dbtx.execute(
                "UPDATE wallet_transactions SET status = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![new_status.to_string(), tx_id],
            )?;

            if approve {
                dbtx.execute(
                    "UPDATE wallets SET balance = balance + ?1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?2",
                    params![row.amount * row.tx_type.sign(), row.wallet_id],
                )?;
            }

            dbtx.commit()?;
            Ok(SettleOutcome::Applied(WalletTransaction {
                status: new_status,
                ..row
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a COMPLETED USAGE row and decrement the balance atomically.
pub async fn debit(
    db: &Database,
    business_id: i64,
    amount: f64,
    reference: String,
    channel: String,
    tracking_number: Option<String>,
) -> Result<WalletTransaction, VitrinaError> {
    let id = db
        .connection()
        .call(move |conn| {
            let dbtx = conn.transaction()?;

            dbtx.execute(
                "INSERT OR IGNORE INTO wallets (business_id) VALUES (?1)",
                params![business_id],
            )?;
            let wallet_id: i64 = dbtx.query_row(
                "SELECT id FROM wallets WHERE business_id = ?1",
                params![business_id],
                |row| row.get(0),
            )?;

            dbtx.execute(
                "INSERT INTO wallet_transactions
                 (wallet_id, business_id, tx_type, status, amount, reference, channel,
                  tracking_number)
                 VALUES (?1, ?2, 'USAGE', 'COMPLETED', ?3, ?4, ?5, ?6)",
                params![wallet_id, business_id, amount, reference, channel, tracking_number],
            )?;
            let tx_id = dbtx.last_insert_rowid();

            dbtx.execute(
                "UPDATE wallets SET balance = balance - ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![amount, wallet_id],
            )?;

            dbtx.commit()?;
            Ok(tx_id)
        })
        .await
        .map_err(map_tr_err)?;

    get_transaction(db, id)
        .await?
        .ok_or_else(|| VitrinaError::Internal("inserted wallet transaction vanished".to_string()))
}

/// Ledger rows in the given status, newest first (admin queues).
pub async fn transactions_by_status(
    db: &Database,
    statuses: Vec<WalletTransactionStatus>,
) -> Result<Vec<WalletTransaction>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut stmt = conn.prepare(&format!(
                "{TX_COLS} WHERE status IN ({placeholders}) ORDER BY created_at DESC, id DESC"
            ))?;
            let args: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), map_transaction)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Ledger rows for one business, newest first.
pub async fn transactions_by_business(
    db: &Database,
    business_id: i64,
) -> Result<Vec<WalletTransaction>, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{TX_COLS} WHERE business_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![business_id], map_transaction)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Physically delete RECHARGE rows for a business's wallet. Returns the
/// number of deleted rows. Admin escape hatch; breaks the audit trail.
pub async fn delete_recharges(db: &Database, business_id: i64) -> Result<usize, VitrinaError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM wallet_transactions WHERE business_id = ?1 AND tx_type = 'RECHARGE'",
                params![business_id],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Signed sum over COMPLETED rows for one wallet (the ledger invariant's
/// right-hand side).
pub async fn completed_sum(db: &Database, wallet_id: i64) -> Result<f64, VitrinaError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(CASE tx_type WHEN 'RECHARGE' THEN amount ELSE -amount END), 0)
                 FROM wallet_transactions
                 WHERE wallet_id = ?1 AND status = 'COMPLETED'",
                params![wallet_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

const WALLET_COLS: &str =
    "SELECT id, business_id, balance, created_at, updated_at FROM wallets";

const TX_COLS: &str = "SELECT id, wallet_id, business_id, tx_type, status, amount, reference,
        channel, tracking_number, created_at, updated_at
 FROM wallet_transactions";

fn map_wallet(row: &rusqlite::Row<'_>) -> Result<Wallet, rusqlite::Error> {
    Ok(Wallet {
        id: row.get(0)?,
        business_id: row.get(1)?,
        balance: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_transaction(row: &rusqlite::Row<'_>) -> Result<WalletTransaction, rusqlite::Error> {
    Ok(WalletTransaction {
        id: row.get(0)?,
        wallet_id: row.get(1)?,
        business_id: row.get(2)?,
        tx_type: parse_column(3, row.get(3)?)?,
        status: parse_column(4, row.get(4)?)?,
        amount: row.get(5)?,
        reference: row.get(6)?,
        channel: row.get(7)?,
        tracking_number: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let bid = db
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO businesses (code, name) VALUES ('BIZ-7', 'Tienda 7')",
                    [],
                )?;
                Ok::<_, rusqlite::Error>(conn.last_insert_rowid())
            })
            .await
            .unwrap();
        (db, bid, dir)
    }

    fn recharge(wallet_id: i64, business_id: i64, amount: f64) -> NewWalletTransaction {
        NewWalletTransaction {
            wallet_id,
            business_id,
            tx_type: WalletTransactionType::Recharge,
            status: WalletTransactionStatus::Pending,
            amount,
            reference: "WR-test".to_string(),
            channel: "STATIC_QR".to_string(),
            tracking_number: None,
        }
    }

    #[tokio::test]
    async fn lazy_create_starts_at_zero() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        assert_eq!(w.balance, 0.0);
        // Second read returns the same wallet.
        let again = get_or_create(&db, bid).await.unwrap();
        assert_eq!(again.id, w.id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn approve_credits_balance_atomically() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        let tx = insert_transaction(&db, recharge(w.id, bid, 20000.0))
            .await
            .unwrap();

        // Balance untouched while PENDING.
        assert_eq!(get_or_create(&db, bid).await.unwrap().balance, 0.0);

        let outcome = settle_transaction(&db, tx.id, true).await.unwrap();
        let settled = match outcome {
            SettleOutcome::Applied(t) => t,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(settled.status, WalletTransactionStatus::Completed);

        let w = get_or_create(&db, bid).await.unwrap();
        assert_eq!(w.balance, 20000.0);
        assert_eq!(completed_sum(&db, w.id).await.unwrap(), w.balance);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reject_leaves_balance_alone() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        let tx = insert_transaction(&db, recharge(w.id, bid, 20000.0))
            .await
            .unwrap();

        let outcome = settle_transaction(&db, tx.id, false).await.unwrap();
        assert!(matches!(outcome, SettleOutcome::Applied(ref t)
            if t.status == WalletTransactionStatus::Failed));
        assert_eq!(get_or_create(&db, bid).await.unwrap().balance, 0.0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn settle_twice_reports_not_pending() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        let tx = insert_transaction(&db, recharge(w.id, bid, 20000.0))
            .await
            .unwrap();
        settle_transaction(&db, tx.id, true).await.unwrap();

        let outcome = settle_transaction(&db, tx.id, true).await.unwrap();
        assert!(matches!(
            outcome,
            SettleOutcome::NotPending(WalletTransactionStatus::Completed)
        ));
        // Balance credited exactly once.
        assert_eq!(get_or_create(&db, bid).await.unwrap().balance, 20000.0);

        assert!(matches!(
            settle_transaction(&db, 9999, true).await.unwrap(),
            SettleOutcome::Missing
        ));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn debit_inserts_completed_usage_row() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        let tx = insert_transaction(&db, recharge(w.id, bid, 30000.0))
            .await
            .unwrap();
        settle_transaction(&db, tx.id, true).await.unwrap();

        let usage = debit(
            &db,
            bid,
            5000.0,
            "GUIDE-1".to_string(),
            "GUIDE".to_string(),
            Some("TRK-99".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(usage.tx_type, WalletTransactionType::Usage);
        assert_eq!(usage.status, WalletTransactionStatus::Completed);
        assert_eq!(usage.tracking_number.as_deref(), Some("TRK-99"));

        let w = get_or_create(&db, bid).await.unwrap();
        assert_eq!(w.balance, 25000.0);
        assert_eq!(completed_sum(&db, w.id).await.unwrap(), w.balance);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn clear_recharges_keeps_usage_rows() {
        let (db, bid, _dir) = setup().await;
        let w = get_or_create(&db, bid).await.unwrap();
        let tx = insert_transaction(&db, recharge(w.id, bid, 30000.0))
            .await
            .unwrap();
        settle_transaction(&db, tx.id, true).await.unwrap();
        debit(&db, bid, 1000.0, "G-1".into(), "GUIDE".into(), None)
            .await
            .unwrap();

        assert_eq!(delete_recharges(&db, bid).await.unwrap(), 1);
        let remaining = transactions_by_business(&db, bid).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tx_type, WalletTransactionType::Usage);
        db.close().await.unwrap();
    }
}
