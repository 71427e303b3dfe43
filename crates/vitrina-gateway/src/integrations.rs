// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration registry routes under `/integrations`.
//!
//! Mutations are platform-only. Lookups are open to any authenticated
//! caller, with business scope pinned to the caller's own tenant.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use vitrina_auth::Subject;
use vitrina_integrations::{CreateIntegration, UpdateIntegration};
use vitrina_storage::queries::integrations::ListFilter;
use vitrina_storage::Integration;

use crate::auth::require_super_admin;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub code: String,
    pub integration_type: String,
    pub category: String,
    #[serde(default)]
    pub business_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub integration_type: Option<String>,
    #[serde(default)]
    pub business_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize, Default)]
pub struct TypeQuery {
    #[serde(default)]
    pub business_id: Option<i64>,
}

/// GET /integrations
pub async fn list(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Business callers only see their own tenant's rows.
    let business_id = subject.scope.business_id().or(query.business_id);
    let (items, total) = state
        .integrations
        .list(ListFilter {
            integration_type: query.integration_type,
            business_id,
            page: query.page,
            page_size: query.page_size,
        })
        .await?;
    Ok(Json(json!({
        "items": items,
        "total": total,
        "page": query.page,
        "page_size": query.page_size,
    })))
}

/// GET /integrations/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<Integration>, ApiError> {
    let integration = state.integrations.get(id).await?;
    guard_visibility(&subject, &integration)?;
    Ok(Json(integration))
}

/// GET /integrations/type/:type
///
/// Resolves the effective integration for a type: the tenant's own row when
/// it has one, otherwise the platform default. Credentials stay sealed.
pub async fn get_by_type(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(integration_type): Path<String>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<Integration>, ApiError> {
    let business_id = match subject.scope.business_id() {
        Some(own) => Some(own),
        None => query.business_id,
    };
    let resolved = state
        .integrations
        .get_by_type(&integration_type, business_id)
        .await?;
    Ok(Json(resolved.integration))
}

/// POST /integrations
pub async fn create(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Integration>), ApiError> {
    require_super_admin(&subject)?;
    let integration = state
        .integrations
        .create(CreateIntegration {
            code: body.code,
            integration_type: body.integration_type,
            category: body.category,
            business_id: body.business_id,
            is_active: body.is_active,
            is_default: body.is_default,
            config: body.config,
            credentials: body.credentials,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(integration)))
}

/// PUT /integrations/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<Integration>, ApiError> {
    require_super_admin(&subject)?;
    let integration = state
        .integrations
        .update(
            id,
            UpdateIntegration {
                category: body.category,
                config: body.config,
                credentials: body.credentials,
            },
        )
        .await?;
    Ok(Json(integration))
}

/// DELETE /integrations/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_super_admin(&subject)?;
    state.integrations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /integrations/:id/test
pub async fn test_connection(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_super_admin(&subject)?;
    state.integrations.test_connection(id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// PUT /integrations/:id/activate
pub async fn activate(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_super_admin(&subject)?;
    state.integrations.set_active(id, true).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /integrations/:id/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_super_admin(&subject)?;
    state.integrations.set_active(id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /integrations/:id/set-default
pub async fn set_default(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_super_admin(&subject)?;
    state.integrations.set_default(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn guard_visibility(subject: &Subject, integration: &Integration) -> Result<(), ApiError> {
    if let Some(own) = subject.scope.business_id() {
        let visible = integration.business_id.is_none() || integration.business_id == Some(own);
        if !visible {
            return Err(vitrina_core::VitrinaError::NotFound(format!(
                "integration {} not found",
                integration.id
            ))
            .into());
        }
    }
    Ok(())
}
