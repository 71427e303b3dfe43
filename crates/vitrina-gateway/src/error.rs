// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain-error to HTTP translation.
//!
//! 4xx responses carry the domain message; 5xx responses log the originating
//! message and return a generic body so internals never leak to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vitrina_core::VitrinaError;

/// JSON error envelope returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Wrapper giving `VitrinaError` an `IntoResponse` impl.
#[derive(Debug)]
pub struct ApiError(pub VitrinaError);

impl From<VitrinaError> for ApiError {
    fn from(e: VitrinaError) -> Self {
        Self(e)
    }
}

fn status_for(e: &VitrinaError) -> StatusCode {
    match e {
        VitrinaError::Validation(_) => StatusCode::BAD_REQUEST,
        VitrinaError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        VitrinaError::Forbidden(_) => StatusCode::FORBIDDEN,
        VitrinaError::NotFound(_) => StatusCode::NOT_FOUND,
        VitrinaError::Conflict(_) => StatusCode::CONFLICT,
        VitrinaError::Storage { .. }
        | VitrinaError::Vendor { .. }
        | VitrinaError::Broker(_)
        | VitrinaError::Vault(_)
        | VitrinaError::Config(_)
        | VitrinaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.key(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let resp = ApiError(VitrinaError::Validation("amount must be positive".into()))
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_are_generic() {
        let resp = ApiError(VitrinaError::Broker("queue gone".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp = ApiError(VitrinaError::Conflict("already processed".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
