// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration connection probe for WhatsApp records.

use async_trait::async_trait;
use serde::Deserialize;
use vitrina_core::VitrinaError;
use vitrina_integrations::ConnectionProber;

use crate::client::WhatsAppClient;

/// Typed view of a WhatsApp integration's `config` blob. The registry stores
/// config as opaque JSON; it becomes typed here, at the first consumer.
#[derive(Debug, Deserialize)]
pub struct WhatsAppIntegrationConfig {
    pub url: String,
    pub phone_number_id: String,
}

/// Typed view of a WhatsApp integration's decrypted `credentials` blob.
#[derive(Deserialize)]
pub struct WhatsAppIntegrationCredentials {
    pub token: String,
}

fn typed<T: for<'de> Deserialize<'de>>(
    value: &serde_json::Value,
    what: &str,
) -> Result<T, VitrinaError> {
    serde_json::from_value(value.clone())
        .map_err(|e| VitrinaError::Validation(format!("malformed {what} in integration record: {e}")))
}

fn non_empty(value: &str, key: &str) -> Result<(), VitrinaError> {
    if value.is_empty() {
        return Err(VitrinaError::Validation(format!(
            "missing '{key}' in integration record"
        )));
    }
    Ok(())
}

/// Builds a throwaway client from the record's `(config, credentials)` and
/// checks the phone number endpoint. Nothing is persisted.
#[derive(Debug, Default)]
pub struct WhatsAppProber;

#[async_trait]
impl ConnectionProber for WhatsAppProber {
    async fn probe(
        &self,
        config: &serde_json::Value,
        credentials: &serde_json::Value,
    ) -> Result<(), VitrinaError> {
        let config: WhatsAppIntegrationConfig = typed(config, "config")?;
        let credentials: WhatsAppIntegrationCredentials = typed(credentials, "credentials")?;
        non_empty(&config.url, "url")?;
        non_empty(&config.phone_number_id, "phone_number_id")?;
        non_empty(&credentials.token, "token")?;

        let client = WhatsAppClient::new(&config.url, &credentials.token, &config.phone_number_id)?;
        client.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_succeeds_against_live_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/12345"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = WhatsAppProber;
        prober
            .probe(
                &serde_json::json!({ "url": server.uri(), "phone_number_id": "12345" }),
                &serde_json::json!({ "token": "t" }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn probe_rejects_incomplete_records() {
        let prober = WhatsAppProber;
        let err = prober
            .probe(
                &serde_json::json!({ "url": "https://example.com" }),
                &serde_json::json!({ "token": "t" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VitrinaError::Validation(_)));
    }
}
