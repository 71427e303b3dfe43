// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Status columns are stored as TEXT and parsed into the typed enums from
//! `vitrina-core` during row mapping; a malformed status surfaces as a
//! conversion failure rather than leaking strings into the domain layer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use vitrina_core::{
    ConversationState, MessageDirection, MessageStatus, PaymentStatus, SyncLogStatus,
    WalletTransactionStatus, WalletTransactionType,
};

/// Parse a TEXT status column into its typed enum inside a row-mapping
/// closure, preserving the column index for the error.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// A tenant of the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub business_type_id: i64,
    pub is_active: bool,
    pub created_at: String,
}

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub require_password_change: bool,
    pub is_active: bool,
    pub created_at: String,
}

/// A (user, business, role) staff binding. `business_id = None` denotes
/// platform scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffBinding {
    pub id: i64,
    pub user_id: i64,
    pub business_id: Option<i64>,
    pub role_id: i64,
}

/// A named capability (resource x action), with the per-business active gate
/// resolved when queried for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub resource_id: i64,
    pub name: String,
    pub action: String,
    pub active: bool,
}

/// A third-party integration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub code: String,
    pub integration_type: String,
    pub category: String,
    pub business_id: Option<i64>,
    pub is_active: bool,
    pub is_default: bool,
    /// Plaintext JSON configuration.
    pub config: serde_json::Value,
    /// Vault blob; `None` once redacted for presentation.
    pub encrypted_credentials: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Integration {
    /// Drop the credential blob for callers that must never see it.
    pub fn redacted(mut self) -> Self {
        self.encrypted_credentials = None;
        self
    }
}

/// A money-movement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub business_id: i64,
    pub amount: f64,
    pub currency: String,
    pub gateway_code: String,
    pub reference: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub external_id: Option<String>,
    pub description: String,
    pub callback_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// One processing attempt of a payment transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSyncLog {
    pub id: i64,
    pub payment_transaction_id: i64,
    pub status: SyncLogStatus,
    pub retry_count: i64,
    pub error_message: Option<String>,
    pub next_retry_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-business balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub business_id: i64,
    pub balance: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only wallet ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub wallet_id: i64,
    pub business_id: i64,
    pub tx_type: WalletTransactionType,
    pub status: WalletTransactionStatus,
    pub amount: f64,
    pub reference: String,
    /// Recharge channel marker, e.g. `STATIC_QR`.
    pub channel: String,
    pub tracking_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A live WhatsApp conversation keyed by (phone_number, order_number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub business_id: i64,
    pub phone_number: String,
    pub order_number: String,
    pub current_state: ConversationState,
    pub last_message_id: Option<String>,
    pub last_template_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

impl Conversation {
    /// Active iff not expired and not in a terminal state. Expiry is
    /// wall-clock on read; an expired conversation is treated like a
    /// missing one.
    pub fn is_active(&self, now: &str) -> bool {
        !self.current_state.is_terminal() && self.expires_at.as_str() > now
    }
}

/// Append-only record of one sent or received WhatsApp message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: i64,
    pub conversation_id: i64,
    pub direction: MessageDirection,
    pub provider_message_id: Option<String>,
    pub template_name: Option<String>,
    pub content: String,
    pub status: MessageStatus,
    pub sent_at: Option<String>,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
    pub failed_at: Option<String>,
    pub created_at: String,
}

/// A durable broker queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}
