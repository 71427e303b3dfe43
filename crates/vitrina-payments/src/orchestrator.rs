// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment orchestrator: create transactions, round-trip them through the
//! broker, and apply vendor responses with bounded retries.
//!
//! Attempt accounting lives in `payment_sync_logs`: each attempt is one row,
//! at most one row per transaction is ever `processing`, and a transaction
//! never accumulates more than [`MAX_RETRIES`] attempts.

use tracing::{error, info, warn};
use vitrina_broker::{Broker, PAY_REQUESTS};
use vitrina_bus::{EventBus, EventEnvelope, PAY_EVENTS};
use vitrina_core::{new_payment_reference, PaymentStatus, SyncLogStatus, VitrinaError};
use vitrina_storage::queries::payments::{self, NewPayment};
use vitrina_storage::{Database, PaymentSyncLog, PaymentTransaction};

use crate::wire::{PaymentRequestMessage, PaymentResponseMessage, ResponseStatus};

/// Attempt budget per transaction.
pub const MAX_RETRIES: i64 = 3;

/// Minutes between a failed attempt and its retry eligibility.
pub const RETRY_DELAY_MINUTES: i64 = 5;

/// Gateways the platform currently routes.
pub const KNOWN_GATEWAYS: &[&str] = &["nequi"];

/// Caller-facing creation payload.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub business_id: i64,
    pub amount: f64,
    pub currency: Option<String>,
    pub gateway_code: String,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub callback_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub(crate) fn retry_at_from_now() -> String {
    (chrono::Utc::now() + chrono::Duration::minutes(RETRY_DELAY_MINUTES))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    db: Database,
    broker: Broker,
    bus: EventBus,
}

impl PaymentOrchestrator {
    pub fn new(db: Database, broker: Broker, bus: EventBus) -> Self {
        Self { db, broker, bus }
    }

    /// Create a transaction and publish its first request.
    ///
    /// The transaction starts `pending` with one `processing` sync log. A
    /// publish failure marks it `failed` immediately; nothing downstream
    /// will ever see it.
    pub async fn create_payment(
        &self,
        req: CreatePayment,
    ) -> Result<PaymentTransaction, VitrinaError> {
        if req.amount <= 0.0 {
            return Err(VitrinaError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if !KNOWN_GATEWAYS.contains(&req.gateway_code.as_str()) {
            return Err(VitrinaError::Validation(format!(
                "unknown gateway code '{}'",
                req.gateway_code
            )));
        }

        let tx = payments::insert(
            &self.db,
            NewPayment {
                business_id: req.business_id,
                amount: req.amount,
                currency: req.currency.unwrap_or_else(|| "COP".to_string()),
                gateway_code: req.gateway_code,
                reference: new_payment_reference(),
                payment_method: req.payment_method.unwrap_or_default(),
                description: req.description.unwrap_or_default(),
                callback_url: req.callback_url,
                metadata: req.metadata,
            },
        )
        .await?;

        payments::insert_sync_log(&self.db, tx.id, SyncLogStatus::Processing, 0).await?;

        if let Err(e) = self.publish_request(&tx).await {
            error!(tx_id = tx.id, error = %e, "request publish failed, failing transaction");
            payments::cancel_processing_logs(&self.db, tx.id).await?;
            payments::set_status(&self.db, tx.id, PaymentStatus::Failed).await?;
            return Err(e);
        }

        self.emit("pay.processing", &tx, serde_json::json!({ "reference": tx.reference }));
        info!(tx_id = tx.id, business_id = tx.business_id, amount = tx.amount, "payment created");
        Ok(tx)
    }

    async fn publish_request(&self, tx: &PaymentTransaction) -> Result<(), VitrinaError> {
        let msg = PaymentRequestMessage {
            payment_transaction_id: tx.id,
            business_id: tx.business_id,
            gateway_code: tx.gateway_code.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            reference: tx.reference.clone(),
            payment_method: tx.payment_method.clone(),
            description: tx.description.clone(),
            metadata: tx.metadata.clone(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: vitrina_core::now_rfc3339(),
        };
        let payload = serde_json::to_value(&msg)
            .map_err(|e| VitrinaError::Internal(format!("request serialization failed: {e}")))?;
        self.broker.publish(PAY_REQUESTS, &payload).await?;
        Ok(())
    }

    fn emit(&self, event_type: &str, tx: &PaymentTransaction, data: serde_json::Value) {
        self.bus
            .publish(PAY_EVENTS, EventEnvelope::new(event_type, tx.business_id, data));
    }

    pub async fn get_payment(&self, id: i64) -> Result<PaymentTransaction, VitrinaError> {
        payments::get(&self.db, id)
            .await?
            .ok_or_else(|| VitrinaError::NotFound(format!("payment transaction {id} not found")))
    }

    pub async fn list_payments(
        &self,
        business_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PaymentTransaction>, i64), VitrinaError> {
        payments::list_by_business(&self.db, business_id, page, page_size).await
    }

    /// Apply a vendor response.
    ///
    /// Responses are applied in arrival order. A duplicate success is a
    /// status no-op that may still fill in a missing external id. A response
    /// for an unknown transaction is logged and dropped, never an error.
    pub async fn process_response(&self, msg: &PaymentResponseMessage) -> Result<(), VitrinaError> {
        let Some(tx) = payments::get(&self.db, msg.payment_transaction_id).await? else {
            warn!(
                tx_id = msg.payment_transaction_id,
                correlation_id = %msg.correlation_id,
                "response for unknown transaction dropped"
            );
            return Ok(());
        };

        let log = payments::processing_log(&self.db, tx.id).await?;

        match msg.status {
            ResponseStatus::Success => self.apply_success(&tx, log, msg).await,
            ResponseStatus::Error => self.apply_error(&tx, log, msg).await,
        }
    }

    async fn apply_success(
        &self,
        tx: &PaymentTransaction,
        log: Option<PaymentSyncLog>,
        msg: &PaymentResponseMessage,
    ) -> Result<(), VitrinaError> {
        payments::complete(&self.db, tx.id, msg.external_id.clone()).await?;
        if let Some(log) = log {
            payments::mark_sync_log(&self.db, log.id, SyncLogStatus::Completed, None, None).await?;
        }

        if tx.status != PaymentStatus::Completed {
            self.emit(
                "pay.completed",
                tx,
                serde_json::json!({
                    "reference": tx.reference,
                    "external_id": msg.external_id,
                }),
            );
        }
        info!(tx_id = tx.id, external_id = ?msg.external_id, "payment completed");
        Ok(())
    }

    async fn apply_error(
        &self,
        tx: &PaymentTransaction,
        log: Option<PaymentSyncLog>,
        msg: &PaymentResponseMessage,
    ) -> Result<(), VitrinaError> {
        let Some(log) = log else {
            warn!(tx_id = tx.id, "error response with no processing attempt dropped");
            return Ok(());
        };
        if tx.status.is_terminal() {
            warn!(tx_id = tx.id, status = %tx.status, "error response for settled transaction dropped");
            payments::mark_sync_log(&self.db, log.id, SyncLogStatus::Cancelled, None, None).await?;
            return Ok(());
        }

        let error_message = if msg.error_code.is_empty() {
            msg.error.clone()
        } else {
            format!("{} ({})", msg.error, msg.error_code)
        };

        if log.retry_count + 1 >= MAX_RETRIES {
            payments::mark_sync_log(
                &self.db,
                log.id,
                SyncLogStatus::Failed,
                Some(error_message.clone()),
                None,
            )
            .await?;
            payments::set_status(&self.db, tx.id, PaymentStatus::Failed).await?;
            self.emit(
                "pay.failed",
                tx,
                serde_json::json!({
                    "reference": tx.reference,
                    "error": error_message,
                }),
            );
            warn!(tx_id = tx.id, "payment failed after exhausting retries");
        } else {
            payments::mark_sync_log(
                &self.db,
                log.id,
                SyncLogStatus::Failed,
                Some(error_message),
                Some(retry_at_from_now()),
            )
            .await?;
            info!(
                tx_id = tx.id,
                attempt = log.retry_count + 1,
                "attempt failed, retry scheduled"
            );
        }
        Ok(())
    }

    /// Retry one failed attempt now.
    ///
    /// Used by both the retry scheduler and the manual retry endpoint. The
    /// old failed log is taken out of the retry pool, any stray `processing`
    /// logs are cancelled, and a fresh attempt is published.
    pub async fn retry_attempt(&self, log: &PaymentSyncLog) -> Result<(), VitrinaError> {
        let tx = payments::get(&self.db, log.payment_transaction_id)
            .await?
            .ok_or_else(|| {
                VitrinaError::NotFound(format!(
                    "payment transaction {} not found",
                    log.payment_transaction_id
                ))
            })?;

        if tx.status == PaymentStatus::Completed {
            payments::mark_sync_log(&self.db, log.id, SyncLogStatus::Cancelled, None, None).await?;
            return Err(VitrinaError::Conflict(format!(
                "transaction {} is already completed",
                tx.id
            )));
        }

        if payments::attempt_count(&self.db, tx.id).await? >= MAX_RETRIES {
            payments::mark_sync_log(&self.db, log.id, log.status, log.error_message.clone(), None)
                .await?;
            payments::set_status(&self.db, tx.id, PaymentStatus::Failed).await?;
            self.emit(
                "pay.failed",
                &tx,
                serde_json::json!({ "reference": tx.reference }),
            );
            return Err(VitrinaError::Conflict(format!(
                "transaction {} has exhausted its attempts",
                tx.id
            )));
        }

        payments::cancel_processing_logs(&self.db, tx.id).await?;
        // Retire the candidate so the next tick does not pick it again.
        payments::mark_sync_log(&self.db, log.id, log.status, log.error_message.clone(), None)
            .await?;
        payments::insert_sync_log(&self.db, tx.id, SyncLogStatus::Processing, log.retry_count + 1)
            .await?;
        self.publish_request(&tx).await?;

        info!(tx_id = tx.id, attempt = log.retry_count + 1, "retry published");
        Ok(())
    }

    /// Manual retry by transaction id: picks the transaction's most recent
    /// failed attempt and republishes it.
    pub async fn retry_payment(&self, tx_id: i64) -> Result<(), VitrinaError> {
        let logs = payments::sync_logs_for(&self.db, tx_id).await?;
        let candidate = logs
            .into_iter()
            .rev()
            .find(|l| l.status == SyncLogStatus::Failed)
            .ok_or_else(|| {
                VitrinaError::Conflict(format!("transaction {tx_id} has no failed attempt to retry"))
            })?;
        self.retry_attempt(&candidate).await
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}
