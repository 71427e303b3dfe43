// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry scheduler: periodically republishes failed payment attempts.
//!
//! Runs every five minutes plus a random jitter of up to sixty seconds so
//! parallel deployments do not tick in lockstep. Each tick drains at most
//! [`TICK_LIMIT`] candidates; anything left waits for the next tick.

use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vitrina_core::VitrinaError;
use vitrina_storage::queries::payments;

use crate::orchestrator::{PaymentOrchestrator, MAX_RETRIES, RETRY_DELAY_MINUTES};

/// Candidates processed per tick.
pub const TICK_LIMIT: i64 = 50;

/// Maximum jitter added to the base interval.
const JITTER_SECS: u64 = 60;

#[derive(Clone)]
pub struct RetryScheduler {
    orchestrator: PaymentOrchestrator,
}

impl RetryScheduler {
    pub fn new(orchestrator: PaymentOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Process one tick's worth of due candidates. Returns how many were
    /// picked up.
    pub async fn run_tick(&self) -> Result<usize, VitrinaError> {
        let now = vitrina_core::now_rfc3339();
        let due =
            payments::due_retry_logs(self.orchestrator.db(), MAX_RETRIES, &now, TICK_LIMIT).await?;
        let picked = due.len();

        for log in due {
            match self.orchestrator.retry_attempt(&log).await {
                Ok(()) => {}
                // Settled or exhausted candidates are retired by the
                // orchestrator; nothing further to do.
                Err(VitrinaError::Conflict(reason)) => {
                    debug!(log_id = log.id, %reason, "retry candidate skipped")
                }
                Err(e) => {
                    error!(log_id = log.id, error = %e, "retry attempt failed")
                }
            }
        }

        if picked > 0 {
            info!(picked, "retry tick processed");
        }
        Ok(picked)
    }

    /// Spawn the periodic loop. Exits cleanly when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_minutes = RETRY_DELAY_MINUTES,
                "retry scheduler started"
            );
            loop {
                let jitter = rand::thread_rng().gen_range(0..=JITTER_SECS);
                let pause = Duration::from_secs(RETRY_DELAY_MINUTES as u64 * 60 + jitter);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
                if let Err(e) = self.run_tick().await {
                    error!(error = %e, "retry tick failed");
                }
            }
            info!("retry scheduler stopped");
        })
    }
}
