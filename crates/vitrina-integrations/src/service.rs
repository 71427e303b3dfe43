// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration registry service.
//!
//! Credentials are encrypted at rest through the vault and only ever leave
//! this module in plaintext via [`IntegrationService::get_by_type`] (for
//! internal callers) and the connection probe. Every other operation returns
//! redacted records.

use serde_json::Value;
use tracing::info;
use vitrina_core::VitrinaError;
use vitrina_storage::queries::integrations::{self, IntegrationUpdate, ListFilter, NewIntegration};
use vitrina_storage::{Database, Integration};
use vitrina_vault::CredentialVault;

use crate::cache::ConfigCache;
use crate::prober::ProberRegistry;

/// Caller-facing creation payload; credentials arrive in plaintext and are
/// sealed before they touch storage.
#[derive(Debug, Clone)]
pub struct CreateIntegration {
    pub code: String,
    pub integration_type: String,
    pub category: String,
    pub business_id: Option<i64>,
    pub is_active: bool,
    pub is_default: bool,
    pub config: Value,
    pub credentials: Option<Value>,
}

/// Caller-facing update payload. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateIntegration {
    pub category: Option<String>,
    pub config: Option<Value>,
    pub credentials: Option<Value>,
}

/// An integration resolved for internal use, with plaintext credentials.
#[derive(Debug, Clone)]
pub struct ResolvedIntegration {
    pub integration: Integration,
    pub credentials: Option<Value>,
}

#[derive(Clone)]
pub struct IntegrationService {
    db: Database,
    vault: CredentialVault,
    cache: ConfigCache,
    probers: ProberRegistry,
}

impl IntegrationService {
    pub fn new(
        db: Database,
        vault: CredentialVault,
        cache: ConfigCache,
        probers: ProberRegistry,
    ) -> Self {
        Self {
            db,
            vault,
            cache,
            probers,
        }
    }

    fn seal(&self, credentials: &Value) -> Result<String, VitrinaError> {
        let plaintext = serde_json::to_vec(credentials)
            .map_err(|e| VitrinaError::Internal(format!("credential serialization failed: {e}")))?;
        self.vault.encrypt(&plaintext)
    }

    fn unseal(&self, blob: &str) -> Result<Value, VitrinaError> {
        let plaintext = self.vault.decrypt(blob)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| VitrinaError::Vault(format!("decrypted credentials are not JSON: {e}")))
    }

    fn cache_key(id: i64) -> String {
        format!("integration:{id}")
    }

    /// Register a new integration. The record comes back redacted.
    pub async fn create(&self, req: CreateIntegration) -> Result<Integration, VitrinaError> {
        if req.code.trim().is_empty() || req.integration_type.trim().is_empty() {
            return Err(VitrinaError::Validation(
                "code and integration_type are required".to_string(),
            ));
        }

        let encrypted = req.credentials.as_ref().map(|c| self.seal(c)).transpose()?;
        let record = integrations::insert(
            &self.db,
            NewIntegration {
                code: req.code,
                integration_type: req.integration_type,
                category: req.category,
                business_id: req.business_id,
                is_active: req.is_active,
                is_default: false,
                config: req.config,
                encrypted_credentials: encrypted,
            },
        )
        .await?;

        // Defaulting clears siblings, so it goes through the dedicated path.
        if req.is_default {
            integrations::set_default(&self.db, record.id).await?;
        }

        info!(id = record.id, code = %record.code, "integration created");
        self.get(record.id).await
    }

    /// Update mutable fields. The config cache entry is dropped on any write.
    pub async fn update(&self, id: i64, req: UpdateIntegration) -> Result<Integration, VitrinaError> {
        let encrypted = req.credentials.as_ref().map(|c| self.seal(c)).transpose()?;
        let updated = integrations::update(
            &self.db,
            id,
            IntegrationUpdate {
                category: req.category,
                config: req.config,
                encrypted_credentials: encrypted,
            },
        )
        .await?
        .ok_or_else(|| VitrinaError::NotFound(format!("integration {id} not found")))?;

        self.cache.invalidate(&Self::cache_key(id));
        Ok(updated.redacted())
    }

    /// Fetch a redacted record by id.
    pub async fn get(&self, id: i64) -> Result<Integration, VitrinaError> {
        integrations::get(&self.db, id)
            .await?
            .map(Integration::redacted)
            .ok_or_else(|| VitrinaError::NotFound(format!("integration {id} not found")))
    }

    /// Resolve the integration serving (type, business) with plaintext
    /// credentials. Business-specific records win over global ones.
    pub async fn get_by_type(
        &self,
        integration_type: &str,
        business_id: Option<i64>,
    ) -> Result<ResolvedIntegration, VitrinaError> {
        let record = integrations::get_by_type(&self.db, integration_type, business_id)
            .await?
            .ok_or_else(|| {
                VitrinaError::NotFound(format!(
                    "no active '{integration_type}' integration configured"
                ))
            })?;

        let credentials = record
            .encrypted_credentials
            .as_deref()
            .map(|blob| self.unseal(blob))
            .transpose()?;

        self.cache
            .set(&Self::cache_key(record.id), record.config.clone());

        Ok(ResolvedIntegration {
            integration: record.redacted(),
            credentials,
        })
    }

    /// Plaintext config by id, memoized with the cache TTL.
    pub async fn config_for(&self, id: i64) -> Result<Value, VitrinaError> {
        let key = Self::cache_key(id);
        if let Some(config) = self.cache.get(&key) {
            return Ok(config);
        }
        let record = self.get(id).await?;
        self.cache.set(&key, record.config.clone());
        Ok(record.config)
    }

    /// List redacted records matching the filter, with a total count.
    pub async fn list(&self, filter: ListFilter) -> Result<(Vec<Integration>, i64), VitrinaError> {
        let (items, total) = integrations::list(&self.db, filter).await?;
        Ok((items.into_iter().map(Integration::redacted).collect(), total))
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<(), VitrinaError> {
        if !integrations::set_active(&self.db, id, active).await? {
            return Err(VitrinaError::NotFound(format!("integration {id} not found")));
        }
        self.cache.invalidate(&Self::cache_key(id));
        info!(id, active, "integration active flag changed");
        Ok(())
    }

    /// Make the record the default for its (type, business) key, clearing
    /// the flag on siblings atomically.
    pub async fn set_default(&self, id: i64) -> Result<(), VitrinaError> {
        if !integrations::set_default(&self.db, id).await? {
            return Err(VitrinaError::NotFound(format!("integration {id} not found")));
        }
        Ok(())
    }

    /// Probe vendor reachability with the record's live config and
    /// credentials. Nothing is persisted.
    pub async fn test_connection(&self, id: i64) -> Result<(), VitrinaError> {
        let record = integrations::get(&self.db, id)
            .await?
            .ok_or_else(|| VitrinaError::NotFound(format!("integration {id} not found")))?;

        let prober = self
            .probers
            .resolve(&record.integration_type)
            .ok_or_else(|| {
                VitrinaError::Validation(format!(
                    "no connection probe available for type '{}'",
                    record.integration_type
                ))
            })?;

        let credentials = record
            .encrypted_credentials
            .as_deref()
            .map(|blob| self.unseal(blob))
            .transpose()?
            .unwrap_or(Value::Null);

        prober.probe(&record.config, &credentials).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), VitrinaError> {
        if !integrations::delete(&self.db, id).await? {
            return Err(VitrinaError::NotFound(format!("integration {id} not found")));
        }
        self.cache.invalidate(&Self::cache_key(id));
        info!(id, "integration deleted");
        Ok(())
    }
}
