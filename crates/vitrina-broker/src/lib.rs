// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable FIFO broker over the SQLite-backed queue table.
//!
//! Each named queue delivers entries in insertion order, at least once.
//! Consumers acknowledge explicitly: a handler returning `Ok` acks the entry,
//! a handler returning `Err` nacks it back to pending until its attempt
//! budget runs out. Entries survive restarts; an entry dequeued by a process
//! that died is reclaimed once its lock expires.
//!
//! This is the transactional counterpart of `vitrina-bus`: use the broker for
//! work that must not be lost, the bus for live UI push.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vitrina_core::VitrinaError;
use vitrina_storage::{queries, Database};

/// Queue carrying outbound payment requests to vendor workers.
pub const PAY_REQUESTS: &str = "pay.requests";

/// Queue carrying vendor payment responses back to the orchestrator.
pub const PAY_RESPONSES: &str = "pay.responses";

/// How often an idle consumer polls for new work.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the redelivery sweep reclaims expired locks.
const RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Processes one queue entry at a time.
///
/// Delivery is at-least-once, so implementations must be idempotent.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn handle(&self, payload: &str) -> Result<(), VitrinaError>;
}

/// Durable message broker backed by the shared database.
///
/// Cloning is cheap and shares the declared-queue set.
#[derive(Clone)]
pub struct Broker {
    db: Database,
    declared: Arc<Mutex<HashSet<String>>>,
}

impl Broker {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            declared: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Register a queue name. Declaring twice is a no-op; publishing or
    /// consuming an undeclared queue is an error, which catches typos in
    /// queue names at startup rather than silently splitting traffic.
    pub fn declare_queue(&self, name: &str) -> Result<(), VitrinaError> {
        if name.is_empty() {
            return Err(VitrinaError::Broker("queue name must not be empty".to_string()));
        }
        self.declared
            .lock()
            .map_err(|_| VitrinaError::Broker("queue registry poisoned".to_string()))?
            .insert(name.to_string());
        debug!(queue = name, "queue declared");
        Ok(())
    }

    fn check_declared(&self, name: &str) -> Result<(), VitrinaError> {
        let declared = self.declared.lock().map_err(|_| {
            VitrinaError::Broker("queue registry poisoned".to_string())
        })?;
        if declared.contains(name) {
            Ok(())
        } else {
            Err(VitrinaError::Broker(format!("queue '{name}' is not declared")))
        }
    }

    /// Publish a JSON payload to a declared queue. Returns the entry id.
    pub async fn publish(
        &self,
        queue: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, VitrinaError> {
        self.check_declared(queue)?;
        let body = serde_json::to_string(payload).map_err(|e| {
            VitrinaError::Broker(format!("payload serialization failed: {e}"))
        })?;
        let id = queries::queue::enqueue(&self.db, queue, &body).await?;
        debug!(queue, entry_id = id, "message published");
        Ok(id)
    }

    /// Number of entries waiting on a queue. Exposed for health reporting.
    pub async fn depth(&self, queue: &str) -> Result<i64, VitrinaError> {
        queries::queue::pending_count(&self.db, queue).await
    }

    /// Spawn a consumer loop for a declared queue.
    ///
    /// The loop drains pending entries, then sleeps for the poll interval.
    /// Handler success acks the entry; handler failure nacks it for
    /// redelivery. The task exits cleanly when `cancel` fires; an entry in
    /// flight at shutdown finishes before the task stops.
    pub fn spawn_consumer(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, VitrinaError> {
        self.check_declared(queue)?;
        let db = self.db.clone();
        let queue = queue.to_string();

        Ok(tokio::spawn(async move {
            info!(queue, "consumer started");
            loop {
                match queries::queue::dequeue(&db, &queue).await {
                    Ok(Some(entry)) => {
                        match handler.handle(&entry.payload).await {
                            Ok(()) => {
                                if let Err(e) = queries::queue::ack(&db, entry.id).await {
                                    error!(queue, entry_id = entry.id, error = %e, "ack failed");
                                }
                            }
                            Err(e) => {
                                warn!(
                                    queue,
                                    entry_id = entry.id,
                                    attempts = entry.attempts,
                                    error = %e,
                                    "handler failed, scheduling redelivery"
                                );
                                if let Err(e) = queries::queue::nack(&db, entry.id).await {
                                    error!(queue, entry_id = entry.id, error = %e, "nack failed");
                                }
                            }
                        }
                        // More work may be waiting; only honor cancellation
                        // between entries.
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(POLL_INTERVAL) => {}
                        }
                    }
                    Err(e) => {
                        error!(queue, error = %e, "dequeue failed");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(POLL_INTERVAL) => {}
                        }
                    }
                }
            }
            info!(queue, "consumer stopped");
        }))
    }

    /// Spawn the background sweep that returns entries with expired
    /// processing locks to pending.
    pub fn spawn_reclaim_sweep(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let db = self.db.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECLAIM_INTERVAL) => {}
                }
                match queries::queue::reclaim_expired(&db).await {
                    Ok(0) => {}
                    Ok(n) => info!(reclaimed = n, "returned expired queue locks to pending"),
                    Err(e) => error!(error = %e, "queue reclaim sweep failed"),
                }
            }
        })
    }
}
