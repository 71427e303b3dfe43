// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Vitrina platform.
//!
//! Every section defaults to an empty/sensible value so the loader can merge
//! TOML and environment layers on top. Required keys are enforced after
//! extraction by `validation::validate_config`, not by serde, so that all
//! missing keys are reported at once.

use serde::{Deserialize, Serialize};

/// Top-level Vitrina configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VitrinaConfig {
    /// Service-wide settings (log level).
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// SQLite database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token authority settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// WhatsApp Cloud API settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Durable broker settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Live event bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// External base URLs handed to clients.
    #[serde(default)]
    pub urls: UrlsConfig,

    /// When true, missing required keys log instead of aborting startup.
    /// Set via `RELAX_ENV=1`.
    #[serde(default, deserialize_with = "de_flag")]
    pub relax_env: bool,
}

/// Service-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. Required (`HTTP_PORT`).
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// SQLite database settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Required (`DATABASE_PATH`).
    #[serde(default)]
    pub path: Option<String>,
}

/// Token authority settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HMAC signing secret. Required (`JWT_SECRET`).
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Session and business token validity in hours.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Max age of the `session_token` cookie in days.
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_ttl_hours: default_session_ttl_hours(),
            cookie_max_age_days: default_cookie_max_age_days(),
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_cookie_max_age_days() -> i64 {
    7
}

/// Credential vault settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// 64-hex (32-byte) AES-256-GCM key. Required (`ENCRYPTION_KEY`).
    #[serde(default)]
    pub encryption_key: Option<String>,
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL. Required (`WHATSAPP_URL`).
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token. Required (`WHATSAPP_TOKEN`).
    #[serde(default)]
    pub token: Option<String>,

    /// Sending phone-number id. Required (`WHATSAPP_PHONE_NUMBER_ID`).
    #[serde(default, deserialize_with = "de_id_string")]
    pub phone_number_id: Option<String>,

    /// App secret used to verify `X-Hub-Signature-256` on inbound webhooks.
    /// Optional; when unset, webhook signatures are not enforced.
    #[serde(default)]
    pub app_secret: Option<String>,
}

/// Durable broker settings.
///
/// The broker persists queues in SQLite; its address is a database path and
/// defaults to the main database when unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Path to the broker's SQLite file (`BROKER_DATABASE_PATH`).
    #[serde(default)]
    pub database_path: Option<String>,
}

/// Live event bus settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Per-channel broadcast buffer capacity (`EVENT_BUS_CAPACITY`).
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}

/// External base URLs handed to clients.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UrlsConfig {
    /// S3 asset base URL. Required (`URL_BASE_DOMAIN_S3`).
    #[serde(default)]
    pub base_domain_s3: Option<String>,

    /// Swagger docs base URL. Required (`URL_BASE_SWAGGER`).
    #[serde(default)]
    pub base_swagger: Option<String>,
}

/// Environment values arrive parsed as loose TOML, so a digits-only id like
/// `WHATSAPP_PHONE_NUMBER_ID=123456` shows up as an integer. Fold it back
/// into a string.
fn de_id_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(i64),
    }

    Ok(Option::<Raw>::deserialize(de)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    }))
}

/// Boolean flag that also accepts the numeric and string spellings used on
/// the command line (`RELAX_ENV=1`, `RELAX_ENV=true`).
fn de_flag<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Num(i64),
        Str(String),
    }

    Ok(match Raw::deserialize(de)? {
        Raw::Bool(b) => b,
        Raw::Num(n) => n != 0,
        Raw::Str(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "yes"),
    })
}
