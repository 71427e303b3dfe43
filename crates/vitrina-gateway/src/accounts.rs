// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account and session routes under `/auth`.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use vitrina_auth::Subject;
use vitrina_core::VitrinaError;

use crate::error::ApiError;
use crate::{auth, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct GeneratePasswordRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BusinessTokenRequest {
    pub business_id: i64,
}

/// POST /auth/login
///
/// Returns the login outcome and also sets the `session_token` cookie so
/// browser clients stay authenticated without storing the bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.auth.login(&body.email, &body.password).await?;

    let max_age = state.cookie_max_age_days * 86_400;
    let cookie = format!(
        "{}={}; Path=/; Max-Age={max_age}; HttpOnly; Secure; SameSite=None",
        auth::SESSION_COOKIE,
        outcome.token
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| VitrinaError::Internal(format!("cookie encoding failed: {e}")))?;

    let mut response = Json(outcome).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// GET /auth/verify
pub async fn verify(Extension(subject): Extension<Subject>) -> Json<serde_json::Value> {
    Json(json!({
        "user_id": subject.user_id,
        "business_id": subject.scope.to_wire(),
        "business_type_id": subject.business_type_id,
        "role_id": subject.role_id,
        "token_type": subject.token_type.to_string(),
        "is_super_admin": subject.is_super_admin(),
    }))
}

/// GET /auth/roles-permissions
pub async fn roles_permissions(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let permissions = state.auth.roles_permissions(&subject).await?;
    Ok(Json(json!({ "permissions": permissions })))
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .change_password(&subject, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/generate-password
///
/// Resets the caller's password, or another user's when the caller has
/// platform scope. The plaintext comes back once and is never stored.
pub async fn generate_password(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    body: Option<Json<GeneratePasswordRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = body.and_then(|Json(b)| b.user_id);
    let password = state.auth.generate_user_password(&subject, target).await?;
    Ok(Json(json!({ "password": password })))
}

/// POST /auth/business-token
pub async fn business_token(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<BusinessTokenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = state.auth.business_token(&subject, body.business_id).await?;
    Ok(Json(json!({ "token": token })))
}
