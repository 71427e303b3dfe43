// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Vitrina platform.
//!
//! The variants follow the platform-wide taxonomy: validation, authorization,
//! not-found, conflict, transient (storage/vendor/broker) and fatal
//! (config/vault). The HTTP facade maps each variant to a status code; the
//! mapping lives in the gateway crate, not here.

use thiserror::Error;

/// The primary error type used across all Vitrina crates.
#[derive(Debug, Error)]
pub enum VitrinaError {
    /// Malformed or out-of-range input. Maps to HTTP 400.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials. Maps to HTTP 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required scope or role. Maps to HTTP 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Entity does not exist. Maps to HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or state-transition violation. Maps to HTTP 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Third-party vendor call failure (WhatsApp, payment gateway worker).
    #[error("vendor error: {message}")]
    Vendor {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Durable broker publish/consume failure.
    #[error("broker error: {0}")]
    Broker(String),

    /// Credential vault failure (bad key, corrupted ciphertext).
    #[error("vault error: {0}")]
    Vault(String),

    /// Configuration errors (missing required keys, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VitrinaError {
    /// Stable English key used by the HTTP facade's error envelope.
    pub fn key(&self) -> &'static str {
        match self {
            VitrinaError::Validation(_) => "validation_error",
            VitrinaError::Unauthorized(_) => "unauthorized",
            VitrinaError::Forbidden(_) => "forbidden",
            VitrinaError::NotFound(_) => "not_found",
            VitrinaError::Conflict(_) => "conflict",
            VitrinaError::Storage { .. } => "storage_error",
            VitrinaError::Vendor { .. } => "vendor_error",
            VitrinaError::Broker(_) => "broker_error",
            VitrinaError::Vault(_) => "vault_error",
            VitrinaError::Config(_) => "configuration_error",
            VitrinaError::Internal(_) => "internal_error",
        }
    }
}
