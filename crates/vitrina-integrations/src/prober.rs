// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection probing for integration records.
//!
//! A prober checks that an integration's `(config, credentials)` pair can
//! reach its vendor, without persisting anything. Probers are registered per
//! integration type at startup; the WhatsApp prober lives in the WhatsApp
//! client crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use vitrina_core::VitrinaError;

/// Vendor reachability check for one integration type.
#[async_trait]
pub trait ConnectionProber: Send + Sync {
    async fn probe(
        &self,
        config: &serde_json::Value,
        credentials: &serde_json::Value,
    ) -> Result<(), VitrinaError>;
}

/// Immutable type-to-prober registry, built once at startup.
#[derive(Clone, Default)]
pub struct ProberRegistry {
    probers: HashMap<String, Arc<dyn ConnectionProber>>,
}

impl ProberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, integration_type: &str, prober: Arc<dyn ConnectionProber>) -> Self {
        self.probers.insert(integration_type.to_string(), prober);
        self
    }

    pub fn resolve(&self, integration_type: &str) -> Option<Arc<dyn ConnectionProber>> {
        self.probers.get(integration_type).cloned()
    }
}
