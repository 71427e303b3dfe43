// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound WhatsApp webhook.
//!
//! Signature failures are rejected; everything past the signature returns
//! 200 so the provider never retries a payload the engine chose to drop.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use tracing::warn;
use vitrina_whatsapp::{parse_webhook, verify_signature};

use crate::AppState;

/// POST /integrations/whatsapp/webhook
pub async fn whatsapp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.whatsapp_app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if verify_signature(secret, &body, signature).is_err() {
            warn!("webhook rejected: bad signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    match parse_webhook(&body) {
        Ok(batch) => state.conversations.handle_webhook(&batch).await,
        Err(e) => warn!(error = %e, "webhook body dropped"),
    }
    StatusCode::OK
}
