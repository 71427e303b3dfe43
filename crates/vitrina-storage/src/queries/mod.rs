// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family.

pub mod conversations;
pub mod integrations;
pub mod messages;
pub mod payments;
pub mod queue;
pub mod users;
pub mod wallets;
