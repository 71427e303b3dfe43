// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker consumer for `pay.responses`.

use async_trait::async_trait;
use tracing::warn;
use vitrina_broker::QueueHandler;
use vitrina_core::VitrinaError;

use crate::orchestrator::PaymentOrchestrator;
use crate::wire::PaymentResponseMessage;

/// Feeds vendor responses from the durable queue into the orchestrator.
///
/// A malformed payload is dropped with a warning rather than nacked: it will
/// never parse better on redelivery.
pub struct ResponseConsumer {
    orchestrator: PaymentOrchestrator,
}

impl ResponseConsumer {
    pub fn new(orchestrator: PaymentOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl QueueHandler for ResponseConsumer {
    async fn handle(&self, payload: &str) -> Result<(), VitrinaError> {
        let msg: PaymentResponseMessage = match serde_json::from_str(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "malformed payment response dropped");
                return Ok(());
            }
        };
        self.orchestrator.process_response(&msg).await
    }
}
