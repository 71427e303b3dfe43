// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of required configuration keys.
//!
//! All missing keys are collected in one pass so operators fix the
//! environment in a single round trip. `RELAX_ENV=1` downgrades missing
//! required keys from a startup abort to a warning list.

use crate::model::VitrinaConfig;

/// One missing or malformed configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// The environment key the operator must set.
    pub env_key: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.env_key, self.message)
    }
}

/// Validate required keys and value shapes.
///
/// Returns the full issue list on failure. With `relax_env` set, required-key
/// issues are returned in `Ok` so the caller can log them and continue;
/// malformed values (wrong shape rather than absent) always fail.
pub fn validate_config(config: &VitrinaConfig) -> Result<Vec<ConfigIssue>, Vec<ConfigIssue>> {
    let mut missing = Vec::new();
    let mut malformed = Vec::new();

    let mut require = |present: bool, env_key: &'static str, message: &str| {
        if !present {
            missing.push(ConfigIssue {
                env_key,
                message: message.to_string(),
            });
        }
    };

    require(
        config.auth.jwt_secret.is_some(),
        "JWT_SECRET",
        "token signing secret is required",
    );
    require(config.http.port.is_some(), "HTTP_PORT", "listen port is required");
    require(
        config.database.path.is_some(),
        "DATABASE_PATH",
        "database file path is required",
    );
    require(
        config.vault.encryption_key.is_some(),
        "ENCRYPTION_KEY",
        "credential encryption key is required",
    );
    require(
        config.whatsapp.url.is_some(),
        "WHATSAPP_URL",
        "WhatsApp API base URL is required",
    );
    require(
        config.whatsapp.token.is_some(),
        "WHATSAPP_TOKEN",
        "WhatsApp API token is required",
    );
    require(
        config.whatsapp.phone_number_id.is_some(),
        "WHATSAPP_PHONE_NUMBER_ID",
        "WhatsApp sender phone-number id is required",
    );
    require(
        config.urls.base_domain_s3.is_some(),
        "URL_BASE_DOMAIN_S3",
        "S3 asset base URL is required",
    );
    require(
        config.urls.base_swagger.is_some(),
        "URL_BASE_SWAGGER",
        "Swagger base URL is required",
    );

    if let Some(key) = &config.vault.encryption_key {
        let is_hex_64 = key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex_64 {
            malformed.push(ConfigIssue {
                env_key: "ENCRYPTION_KEY",
                message: "must be 64 hex characters (32 bytes)".to_string(),
            });
        }
    }

    if let Some(secret) = &config.auth.jwt_secret {
        if secret.len() < 16 {
            malformed.push(ConfigIssue {
                env_key: "JWT_SECRET",
                message: "must be at least 16 characters".to_string(),
            });
        }
    }

    if !malformed.is_empty() {
        let mut all = malformed;
        all.extend(missing);
        return Err(all);
    }

    if missing.is_empty() || config.relax_env {
        Ok(missing)
    } else {
        Err(missing)
    }
}
