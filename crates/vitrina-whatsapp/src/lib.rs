// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API integration: outbound template sends, inbound webhook
//! parsing with signature verification, and the connection probe used by the
//! integration registry.

pub mod client;
pub mod phone;
pub mod prober;
pub mod webhook;

pub use client::{TemplateSend, WhatsAppClient};
pub use phone::normalize_phone;
pub use prober::{WhatsAppIntegrationConfig, WhatsAppIntegrationCredentials, WhatsAppProber};
pub use webhook::{parse_webhook, verify_signature, IncomingMessage, StatusUpdate, WebhookBatch};
