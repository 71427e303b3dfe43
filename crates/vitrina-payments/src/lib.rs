// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment orchestration.
//!
//! Transactions are created `pending`, published to vendor workers over the
//! durable broker, and settled by responses on the paired queue. Failed
//! attempts are retried up to three times on a five-minute cadence; live
//! progress is pushed on the `pay.events` bus channel.

pub mod consumer;
pub mod orchestrator;
pub mod scheduler;
pub mod wire;

pub use consumer::ResponseConsumer;
pub use orchestrator::{CreatePayment, PaymentOrchestrator, MAX_RETRIES};
pub use scheduler::RetryScheduler;
pub use wire::{PaymentRequestMessage, PaymentResponseMessage, ResponseStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vitrina_broker::{Broker, PAY_REQUESTS, PAY_RESPONSES};
    use vitrina_bus::{EventBus, PAY_EVENTS};
    use vitrina_core::{PaymentStatus, SyncLogStatus, VitrinaError};
    use vitrina_storage::queries::payments;
    use vitrina_storage::Database;

    struct Harness {
        orchestrator: PaymentOrchestrator,
        db: Database,
        broker: Broker,
        bus: EventBus,
        _dir: tempfile::TempDir,
    }

    async fn setup() -> Harness {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO businesses (id, code, name) VALUES (7, 'BIZ-7', 'Tienda 7')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        let broker = Broker::new(db.clone());
        broker.declare_queue(PAY_REQUESTS).unwrap();
        broker.declare_queue(PAY_RESPONSES).unwrap();
        let bus = EventBus::new(16);
        Harness {
            orchestrator: PaymentOrchestrator::new(db.clone(), broker.clone(), bus.clone()),
            db,
            broker,
            bus,
            _dir: dir,
        }
    }

    fn create_request(amount: f64) -> CreatePayment {
        CreatePayment {
            business_id: 7,
            amount,
            currency: Some("COP".to_string()),
            gateway_code: "nequi".to_string(),
            payment_method: Some("push".to_string()),
            description: Some("pedido 42".to_string()),
            callback_url: None,
            metadata: Some(serde_json::json!({"order": "ORD-42"})),
        }
    }

    fn success_response(tx_id: i64, external_id: &str) -> PaymentResponseMessage {
        PaymentResponseMessage {
            payment_transaction_id: tx_id,
            gateway_code: "nequi".to_string(),
            status: ResponseStatus::Success,
            external_id: Some(external_id.to_string()),
            gateway_response: None,
            error: String::new(),
            error_code: String::new(),
            correlation_id: "corr-1".to_string(),
            timestamp: vitrina_core::now_rfc3339(),
            processing_time_ms: 120,
        }
    }

    fn error_response(tx_id: i64) -> PaymentResponseMessage {
        PaymentResponseMessage {
            status: ResponseStatus::Error,
            external_id: None,
            error: "gateway timeout".to_string(),
            error_code: "NEQ-504".to_string(),
            ..success_response(tx_id, "")
        }
    }

    /// Force every failed log of a transaction to be due now.
    async fn force_due(db: &Database, tx_id: i64) {
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE payment_sync_logs
                     SET next_retry_at = '2000-01-01T00:00:00.000Z'
                     WHERE payment_transaction_id = ?1 AND status = 'failed'
                       AND next_retry_at IS NOT NULL",
                    rusqlite::params![tx_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_validates_input() {
        let h = setup().await;
        assert!(matches!(
            h.orchestrator.create_payment(create_request(0.0)).await,
            Err(VitrinaError::Validation(_))
        ));
        let mut bad_gateway = create_request(1000.0);
        bad_gateway.gateway_code = "paypal".to_string();
        assert!(matches!(
            h.orchestrator.create_payment(bad_gateway).await,
            Err(VitrinaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn happy_path_payment() {
        let h = setup().await;
        let mut events = h.bus.subscribe(PAY_EVENTS);

        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();
        assert_eq!(tx.status, PaymentStatus::Pending);
        assert_eq!(tx.reference.len(), 32);
        assert!(tx.reference.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h.broker.depth(PAY_REQUESTS).await.unwrap(), 1);
        assert_eq!(events.recv().await.unwrap().event_type, "pay.processing");

        h.orchestrator
            .process_response(&success_response(tx.id, "NQ-1"))
            .await
            .unwrap();

        let settled = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        assert_eq!(settled.external_id.as_deref(), Some("NQ-1"));

        let logs = payments::sync_logs_for(&h.db, tx.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncLogStatus::Completed);

        assert_eq!(events.recv().await.unwrap().event_type, "pay.completed");
    }

    #[tokio::test]
    async fn duplicate_success_is_idempotent() {
        let h = setup().await;
        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();

        h.orchestrator
            .process_response(&success_response(tx.id, "NQ-1"))
            .await
            .unwrap();
        h.orchestrator
            .process_response(&success_response(tx.id, "NQ-OTHER"))
            .await
            .unwrap();

        let settled = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        // The first external id sticks.
        assert_eq!(settled.external_id.as_deref(), Some("NQ-1"));
    }

    #[tokio::test]
    async fn unknown_transaction_response_is_dropped() {
        let h = setup().await;
        h.orchestrator
            .process_response(&success_response(9999, "NQ-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_schedules_retry_until_exhausted() {
        let h = setup().await;
        let mut events = h.bus.subscribe(PAY_EVENTS);
        let scheduler = RetryScheduler::new(h.orchestrator.clone());

        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();
        let _ = events.recv().await.unwrap(); // pay.processing

        // Attempt 1 fails: still pending, next retry scheduled.
        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();
        let after_first = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(after_first.status, PaymentStatus::Pending);
        let logs = payments::sync_logs_for(&h.db, tx.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].next_retry_at.is_some());
        assert!(logs[0].error_message.as_deref().unwrap().contains("NEQ-504"));

        // Scheduler republishes attempt 2.
        force_due(&h.db, tx.id).await;
        assert_eq!(scheduler.run_tick().await.unwrap(), 1);
        assert_eq!(h.broker.depth(PAY_REQUESTS).await.unwrap(), 2);
        let logs = payments::sync_logs_for(&h.db, tx.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].status, SyncLogStatus::Processing);
        assert_eq!(logs[1].retry_count, 1);

        // Attempt 2 fails, scheduler publishes attempt 3, which also fails:
        // budget exhausted, transaction failed.
        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();
        force_due(&h.db, tx.id).await;
        assert_eq!(scheduler.run_tick().await.unwrap(), 1);
        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();

        let settled = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Failed);
        let logs = payments::sync_logs_for(&h.db, tx.id).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(events.recv().await.unwrap().event_type, "pay.failed");

        // Nothing left for the scheduler.
        force_due(&h.db, tx.id).await;
        assert_eq!(scheduler.run_tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn at_most_one_processing_log() {
        let h = setup().await;
        let scheduler = RetryScheduler::new(h.orchestrator.clone());
        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();

        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();
        force_due(&h.db, tx.id).await;
        scheduler.run_tick().await.unwrap();

        let logs = payments::sync_logs_for(&h.db, tx.id).await.unwrap();
        let processing = logs
            .iter()
            .filter(|l| l.status == SyncLogStatus::Processing)
            .count();
        assert_eq!(processing, 1);
    }

    #[tokio::test]
    async fn retry_refuses_completed_transaction() {
        let h = setup().await;
        let scheduler = RetryScheduler::new(h.orchestrator.clone());
        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();

        // Attempt fails, then a late success lands before the tick.
        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();
        h.orchestrator
            .process_response(&success_response(tx.id, "NQ-1"))
            .await
            .unwrap();

        force_due(&h.db, tx.id).await;
        // The candidate is picked but skipped, and retired from the pool.
        assert_eq!(scheduler.run_tick().await.unwrap(), 1);
        assert_eq!(scheduler.run_tick().await.unwrap(), 0);
        let settled = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn manual_retry_needs_failed_attempt() {
        let h = setup().await;
        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();
        assert!(matches!(
            h.orchestrator.retry_payment(tx.id).await,
            Err(VitrinaError::Conflict(_))
        ));

        h.orchestrator
            .process_response(&error_response(tx.id))
            .await
            .unwrap();
        h.orchestrator.retry_payment(tx.id).await.unwrap();
        assert_eq!(h.broker.depth(PAY_REQUESTS).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn response_consumer_applies_queue_payloads() {
        use vitrina_broker::QueueHandler;

        let h = setup().await;
        let tx = h
            .orchestrator
            .create_payment(create_request(25000.0))
            .await
            .unwrap();

        let consumer = ResponseConsumer::new(h.orchestrator.clone());
        let payload = serde_json::to_string(&success_response(tx.id, "NQ-1")).unwrap();
        consumer.handle(&payload).await.unwrap();
        // Malformed payloads are swallowed, not redelivered forever.
        consumer.handle("not json").await.unwrap();

        let settled = h.orchestrator.get_payment(tx.id).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
    }
}
