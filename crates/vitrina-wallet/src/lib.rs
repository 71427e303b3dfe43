// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prepaid wallet ledger.
//!
//! Every balance movement is a `WalletTransaction` row; the wallet balance
//! always equals the signed sum of its COMPLETED rows (`+` for RECHARGE,
//! `-` for USAGE). Recharges are created PENDING and only touch the balance
//! on approval; debits post as COMPLETED immediately. The storage layer keeps
//! each (row write, balance write) pair inside one transaction.

use tracing::{info, warn};
use vitrina_core::{
    new_recharge_reference, VitrinaError, WalletTransactionStatus, WalletTransactionType,
};
use vitrina_storage::queries::wallets::{self, NewWalletTransaction, SettleOutcome};
use vitrina_storage::{Database, Wallet, WalletTransaction};

/// Minimum accepted recharge amount in COP.
pub const MIN_RECHARGE_AMOUNT: f64 = 15000.0;

/// Channel marker stamped on recharge requests paid by static QR.
pub const STATIC_QR_CHANNEL: &str = "STATIC_QR";

/// Channel marker for administrative debits.
pub const MANUAL_CHANNEL: &str = "MANUAL";

/// Channel marker for shipping-guide debits.
pub const GUIDE_CHANNEL: &str = "GUIDE";

#[derive(Clone)]
pub struct WalletService {
    db: Database,
}

impl WalletService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a business's wallet, creating it at balance 0 on first access.
    pub async fn get_wallet(&self, business_id: i64) -> Result<Wallet, VitrinaError> {
        wallets::get_or_create(&self.db, business_id).await
    }

    /// All wallets, for platform-level overviews.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, VitrinaError> {
        wallets::list_all(&self.db).await
    }

    /// Request a recharge. Creates a PENDING RECHARGE row with a generated
    /// reference; the balance moves only when an operator approves it.
    pub async fn recharge(
        &self,
        business_id: i64,
        amount: f64,
    ) -> Result<WalletTransaction, VitrinaError> {
        if amount < MIN_RECHARGE_AMOUNT {
            return Err(VitrinaError::Validation(format!(
                "recharge amount must be at least {MIN_RECHARGE_AMOUNT} COP"
            )));
        }

        let wallet = wallets::get_or_create(&self.db, business_id).await?;
        let tx = wallets::insert_transaction(
            &self.db,
            NewWalletTransaction {
                wallet_id: wallet.id,
                business_id,
                tx_type: WalletTransactionType::Recharge,
                status: WalletTransactionStatus::Pending,
                amount,
                reference: new_recharge_reference(),
                channel: STATIC_QR_CHANNEL.to_string(),
                tracking_number: None,
            },
        )
        .await?;

        info!(business_id, tx_id = tx.id, amount, "recharge requested");
        Ok(tx)
    }

    /// Approve a PENDING transaction: row goes COMPLETED and the wallet is
    /// credited atomically.
    pub async fn approve_transaction(&self, tx_id: i64) -> Result<WalletTransaction, VitrinaError> {
        self.settle(tx_id, true).await
    }

    /// Reject a PENDING transaction: row goes FAILED, balance untouched.
    pub async fn reject_transaction(&self, tx_id: i64) -> Result<WalletTransaction, VitrinaError> {
        self.settle(tx_id, false).await
    }

    async fn settle(&self, tx_id: i64, approve: bool) -> Result<WalletTransaction, VitrinaError> {
        match wallets::settle_transaction(&self.db, tx_id, approve).await? {
            SettleOutcome::Applied(tx) => {
                info!(tx_id, approve, "wallet transaction settled");
                Ok(tx)
            }
            SettleOutcome::NotPending(status) => Err(VitrinaError::Conflict(format!(
                "transaction {tx_id} is {status}, not PENDING"
            ))),
            SettleOutcome::Missing => Err(VitrinaError::NotFound(format!(
                "wallet transaction {tx_id} not found"
            ))),
        }
    }

    /// Administrative debit. Posts COMPLETED and decrements the balance in
    /// one step. Balance may go negative.
    pub async fn manual_debit(
        &self,
        business_id: i64,
        amount: f64,
        reference: &str,
    ) -> Result<WalletTransaction, VitrinaError> {
        if amount <= 0.0 {
            return Err(VitrinaError::Validation(
                "debit amount must be positive".to_string(),
            ));
        }
        let tx = wallets::debit(
            &self.db,
            business_id,
            amount,
            reference.to_string(),
            MANUAL_CHANNEL.to_string(),
            None,
        )
        .await?;
        info!(business_id, tx_id = tx.id, amount, "manual debit posted");
        Ok(tx)
    }

    /// Debit for a shipping guide, keyed by tracking number.
    pub async fn debit_for_guide(
        &self,
        business_id: i64,
        amount: f64,
        tracking_number: &str,
    ) -> Result<WalletTransaction, VitrinaError> {
        if amount <= 0.0 {
            return Err(VitrinaError::Validation(
                "debit amount must be positive".to_string(),
            ));
        }
        if tracking_number.trim().is_empty() {
            return Err(VitrinaError::Validation(
                "tracking number is required".to_string(),
            ));
        }
        let tx = wallets::debit(
            &self.db,
            business_id,
            amount,
            format!("GUIDE-{tracking_number}"),
            GUIDE_CHANNEL.to_string(),
            Some(tracking_number.to_string()),
        )
        .await?;
        info!(business_id, tx_id = tx.id, amount, tracking_number, "guide debit posted");
        Ok(tx)
    }

    /// All PENDING rows across wallets (operator approval queue).
    pub async fn pending_transactions(&self) -> Result<Vec<WalletTransaction>, VitrinaError> {
        wallets::transactions_by_status(&self.db, vec![WalletTransactionStatus::Pending]).await
    }

    /// All settled rows (COMPLETED or FAILED) across wallets.
    pub async fn processed_transactions(&self) -> Result<Vec<WalletTransaction>, VitrinaError> {
        wallets::transactions_by_status(
            &self.db,
            vec![
                WalletTransactionStatus::Completed,
                WalletTransactionStatus::Failed,
            ],
        )
        .await
    }

    /// One business's full ledger, newest first.
    pub async fn transactions_for_business(
        &self,
        business_id: i64,
    ) -> Result<Vec<WalletTransaction>, VitrinaError> {
        wallets::transactions_by_business(&self.db, business_id).await
    }

    /// Physically delete a business's RECHARGE rows. Destroys audit history;
    /// reserved for platform operators.
    pub async fn clear_recharge_history(&self, business_id: i64) -> Result<usize, VitrinaError> {
        let deleted = wallets::delete_recharges(&self.db, business_id).await?;
        warn!(business_id, deleted, "recharge history cleared");
        Ok(deleted)
    }
}
