// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration registry: vendor connections per tenant, with credentials
//! sealed in the vault and plaintext config cached in-process.

pub mod cache;
pub mod prober;
pub mod service;

pub use cache::ConfigCache;
pub use prober::{ConnectionProber, ProberRegistry};
pub use service::{
    CreateIntegration, IntegrationService, ResolvedIntegration, UpdateIntegration,
};
