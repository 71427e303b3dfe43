// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Vitrina crates.
//!
//! Status enums round-trip through their string form (Display/FromStr) because
//! the storage layer persists them as TEXT columns.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The authority scope carried by a validated token.
///
/// The wire format encodes platform scope as `business_id == 0`; it is
/// modeled explicitly so role checks never compare against a magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Super-admin: not bound to any tenant.
    Platform,
    /// Bound to a single business tenant.
    Business(i64),
}

impl Scope {
    /// Decode the wire form, where business id 0 denotes platform scope.
    pub fn from_wire(business_id: i64) -> Self {
        if business_id == 0 {
            Scope::Platform
        } else {
            Scope::Business(business_id)
        }
    }

    /// Encode back to the wire form.
    pub fn to_wire(self) -> i64 {
        match self {
            Scope::Platform => 0,
            Scope::Business(id) => id,
        }
    }

    pub fn is_platform(self) -> bool {
        matches!(self, Scope::Platform)
    }

    /// The business id this scope grants access to, if any.
    pub fn business_id(self) -> Option<i64> {
        match self {
            Scope::Platform => None,
            Scope::Business(id) => Some(id),
        }
    }
}

/// Lifecycle status of a payment transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }
}

/// Status of one processing attempt (sync log row) of a payment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Type of a wallet ledger row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletTransactionType {
    Recharge,
    Usage,
}

impl WalletTransactionType {
    /// Sign applied to the amount when summing the ledger.
    pub fn sign(self) -> f64 {
        match self {
            WalletTransactionType::Recharge => 1.0,
            WalletTransactionType::Usage => -1.0,
        }
    }
}

/// Status of a wallet ledger row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletTransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// States of the WhatsApp order-confirmation state machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Start,
    AwaitingConfirmation,
    AwaitingMenuSelection,
    AwaitingNoveltyType,
    AwaitingCancelConfirm,
    AwaitingCancelReason,
    Completed,
    HandoffToHuman,
}

impl ConversationState {
    /// Terminal states accept no further utterances.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationState::Completed | ConversationState::HandoffToHuman
        )
    }
}

/// Direction of a logged WhatsApp message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Delivery status of a logged WhatsApp message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}
