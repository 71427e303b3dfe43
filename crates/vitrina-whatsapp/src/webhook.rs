// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook parsing and signature verification.
//!
//! A webhook body is a batch of entries; each change with `field =
//! "messages"` carries incoming messages and delivery status updates, which
//! are split into two streams for the conversation engine.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use vitrina_core::{MessageStatus, VitrinaError};

type HmacSha256 = Hmac<Sha256>;

/// Verify the `X-Hub-Signature-256` header against the raw body.
///
/// The header is `sha256=<hex>` over the body with the app secret as key.
pub fn verify_signature(
    app_secret: &str,
    raw_body: &[u8],
    signature_header: &str,
) -> Result<(), VitrinaError> {
    let invalid = || VitrinaError::Unauthorized("invalid webhook signature".to_string());

    let hex_sig = signature_header.strip_prefix("sha256=").ok_or_else(invalid)?;
    let expected = hex::decode(hex_sig).map_err(|_| invalid())?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| VitrinaError::Internal(format!("hmac key setup failed: {e}")))?;
    mac.update(raw_body);
    mac.verify_slice(&expected).map_err(|_| invalid())
}

/// One inbound user message, with its text already extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub from: String,
    pub text: String,
    pub provider_message_id: String,
    pub timestamp: String,
}

/// One delivery status transition for a previously sent message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub provider_message_id: String,
    pub status: MessageStatus,
    pub timestamp: String,
}

/// The two streams extracted from one webhook body.
#[derive(Debug, Default)]
pub struct WebhookBatch {
    pub messages: Vec<IncomingMessage>,
    pub statuses: Vec<StatusUpdate>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Deserialize)]
struct Change {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Deserialize, Default)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    statuses: Vec<RawStatus>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    from: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    button: Option<ButtonBody>,
    #[serde(default)]
    interactive: Option<InteractiveBody>,
}

#[derive(Deserialize)]
struct TextBody {
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct ButtonBody {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct InteractiveBody {
    #[serde(default)]
    button_reply: Option<ReplyTitle>,
    #[serde(default)]
    list_reply: Option<ReplyTitle>,
}

#[derive(Deserialize)]
struct ReplyTitle {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: String,
}

impl RawMessage {
    /// Plain body, button text, or interactive reply title, whichever the
    /// message carries.
    fn extract_text(&self) -> Option<String> {
        if let Some(text) = &self.text {
            return Some(text.body.clone());
        }
        if let Some(button) = &self.button {
            return Some(button.text.clone());
        }
        if let Some(interactive) = &self.interactive {
            if let Some(reply) = &interactive.button_reply {
                return Some(reply.title.clone());
            }
            if let Some(reply) = &interactive.list_reply {
                return Some(reply.title.clone());
            }
        }
        None
    }
}

/// Parse a webhook body into its message and status streams.
///
/// Changes whose field is not `messages`, and messages without extractable
/// text (media, reactions), are skipped. Unknown provider statuses are
/// skipped as well.
pub fn parse_webhook(raw_body: &[u8]) -> Result<WebhookBatch, VitrinaError> {
    let payload: Payload = serde_json::from_slice(raw_body)
        .map_err(|e| VitrinaError::Validation(format!("malformed webhook body: {e}")))?;

    let mut batch = WebhookBatch::default();
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                continue;
            }
            for msg in &change.value.messages {
                if let Some(text) = msg.extract_text() {
                    batch.messages.push(IncomingMessage {
                        from: msg.from.clone(),
                        text,
                        provider_message_id: msg.id.clone(),
                        timestamp: msg.timestamp.clone(),
                    });
                }
            }
            for status in &change.value.statuses {
                if let Ok(parsed) = status.status.parse::<MessageStatus>() {
                    batch.statuses.push(StatusUpdate {
                        provider_message_id: status.id.clone(),
                        status: parsed,
                        timestamp: status.timestamp.clone(),
                    });
                }
            }
        }
    }
    Ok(batch)
}
