// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults, `vitrina.toml`
//! in the working directory, then the flat environment keys the deployment
//! environment exports (`JWT_SECRET`, `HTTP_PORT`, ...).

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VitrinaConfig;

/// Load configuration from `vitrina.toml` plus environment overrides.
pub fn load_config() -> Result<VitrinaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::file("vitrina.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no env lookup). Test hook.
pub fn load_config_from_str(toml_content: &str) -> Result<VitrinaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<VitrinaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VitrinaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping the deployment's flat key names onto config
/// sections.
///
/// The environment surface is flat legacy names (`JWT_SECRET`, not
/// `VITRINA_AUTH_JWT_SECRET`), so the provider whitelists exactly the keys it
/// understands and maps each one explicitly. Figment hands `map` the
/// lowercased key.
fn env_provider() -> Env {
    Env::raw()
        .only(&[
            "JWT_SECRET",
            "HTTP_PORT",
            "HTTP_HOST",
            "DATABASE_PATH",
            "ENCRYPTION_KEY",
            "WHATSAPP_URL",
            "WHATSAPP_TOKEN",
            "WHATSAPP_PHONE_NUMBER_ID",
            "WHATSAPP_APP_SECRET",
            "BROKER_DATABASE_PATH",
            "EVENT_BUS_CAPACITY",
            "URL_BASE_DOMAIN_S3",
            "URL_BASE_SWAGGER",
            "LOG_LEVEL",
            "RELAX_ENV",
        ])
        .map(|key| {
            let mapped = match key.as_str() {
                "jwt_secret" => "auth.jwt_secret",
                "http_port" => "http.port",
                "http_host" => "http.host",
                "database_path" => "database.path",
                "encryption_key" => "vault.encryption_key",
                "whatsapp_url" => "whatsapp.url",
                "whatsapp_token" => "whatsapp.token",
                "whatsapp_phone_number_id" => "whatsapp.phone_number_id",
                "whatsapp_app_secret" => "whatsapp.app_secret",
                "broker_database_path" => "broker.database_path",
                "event_bus_capacity" => "bus.capacity",
                "url_base_domain_s3" => "urls.base_domain_s3",
                "url_base_swagger" => "urls.base_swagger",
                "log_level" => "service.log_level",
                "relax_env" => "relax_env",
                other => other,
            };
            mapped.into()
        })
}
