// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Vitrina commerce platform.
//!
//! This crate provides the error taxonomy and the shared domain types
//! (scopes, status enums, reference generation) used throughout the
//! workspace. It carries no I/O of its own.

pub mod error;
pub mod reference;
pub mod types;

pub use error::VitrinaError;
pub use reference::{new_payment_reference, new_recharge_reference, now_rfc3339};
pub use types::{
    ConversationState, MessageDirection, MessageStatus, PaymentStatus, Scope, SyncLogStatus,
    WalletTransactionStatus, WalletTransactionType,
};
