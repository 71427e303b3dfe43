// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp order-confirmation conversations.
//!
//! [`templates`] is the static registry of approved templates, [`engine`] is
//! the pure state machine, and [`ConversationService`] wires both to storage,
//! the outbound client, and the live event bus.

pub mod engine;
pub mod service;
pub mod templates;

pub use engine::{transition, DomainEvent, StateTransition};
pub use service::{ConversationService, TemplateSender};
