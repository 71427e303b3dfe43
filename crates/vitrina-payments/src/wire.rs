// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON message schemas for the `pay.requests` / `pay.responses` queues.

use serde::{Deserialize, Serialize};

/// Outbound request consumed by a vendor-specific worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestMessage {
    pub payment_transaction_id: i64,
    pub business_id: i64,
    pub gateway_code: String,
    pub amount: f64,
    pub currency: String,
    pub reference: String,
    pub payment_method: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub correlation_id: String,
    pub timestamp: String,
}

/// Worker verdict on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Inbound response published by a vendor worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponseMessage {
    pub payment_transaction_id: i64,
    pub gateway_code: String,
    pub status: ResponseStatus,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<serde_json::Value>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: String,
    pub correlation_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_optionals_default() {
        let msg: PaymentResponseMessage = serde_json::from_value(serde_json::json!({
            "payment_transaction_id": 1,
            "gateway_code": "nequi",
            "status": "success",
            "external_id": "NQ-1",
            "correlation_id": "abc",
            "timestamp": "2026-08-24T12:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(msg.status, ResponseStatus::Success);
        assert!(msg.gateway_response.is_none());
        assert!(msg.error.is_empty());
        assert_eq!(msg.processing_time_ms, 0);
    }
}
