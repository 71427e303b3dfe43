// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware.
//!
//! The credential is a signed token, presented either as
//! `Authorization: Bearer <token>` or as the `session_token` cookie set at
//! login. The bearer header wins when both are present. Session and business
//! tokens are both accepted; routes that care about the family (business
//! switch) check the resolved [`Subject`] themselves.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use vitrina_auth::{Subject, TokenType};
use vitrina_core::VitrinaError;

use crate::error::ApiError;
use crate::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session_token";

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn cookie_token(request: &Request) -> Option<String> {
    let cookies = request.headers().get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Resolve the caller from a raw token string.
///
/// Session tokens are the common case; business tokens (minted by the
/// business-switch endpoint) are equally valid credentials.
pub fn resolve_subject(state: &AppState, token: &str) -> Result<Subject, VitrinaError> {
    let claims = state
        .auth
        .authority()
        .validate(token, TokenType::Session)
        .or_else(|_| state.auth.authority().validate(token, TokenType::Business))?;
    Ok(Subject::from_claims(&claims))
}

/// Middleware guarding every authenticated route. Attaches the resolved
/// [`Subject`] as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .or_else(|| cookie_token(&request))
        .ok_or_else(|| VitrinaError::Unauthorized("missing token".to_string()))?;

    let subject = resolve_subject(&state, &token)?;
    request.extensions_mut().insert(subject);
    Ok(next.run(request).await)
}

/// Guard for platform-only operations.
pub fn require_super_admin(subject: &Subject) -> Result<(), VitrinaError> {
    if subject.is_super_admin() {
        Ok(())
    } else {
        Err(VitrinaError::Forbidden(
            "platform scope required".to_string(),
        ))
    }
}
