// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API.
//!
//! Sends template messages with positional body parameters and quick-reply
//! buttons. Vendor calls time out after 30 seconds; HTTP 429 is retried
//! twice with a 5-second backoff. Any non-2xx reply or an empty `messages`
//! array is a hard failure.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};
use vitrina_core::VitrinaError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_RETRIES: u32 = 2;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// A template send order: name, language, ordered body values, and button
/// labels (emitted as quick replies with payloads `button_0..button_n`).
#[derive(Debug, Clone)]
pub struct TemplateSend {
    pub to: String,
    pub template_name: String,
    pub language: String,
    pub body_params: Vec<String>,
    pub buttons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Client for one WhatsApp business phone number.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
}

impl WhatsAppClient {
    pub fn new(base_url: &str, token: &str, phone_number_id: &str) -> Result<Self, VitrinaError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| VitrinaError::Config(format!("invalid WhatsApp token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VitrinaError::Vendor {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    fn build_payload(&self, send: &TemplateSend) -> serde_json::Value {
        let mut components = Vec::new();

        if !send.body_params.is_empty() {
            let parameters: Vec<serde_json::Value> = send
                .body_params
                .iter()
                .map(|v| serde_json::json!({ "type": "text", "text": v }))
                .collect();
            components.push(serde_json::json!({ "type": "body", "parameters": parameters }));
        }

        for (i, _label) in send.buttons.iter().enumerate() {
            components.push(serde_json::json!({
                "type": "button",
                "sub_type": "quick_reply",
                "index": i.to_string(),
                "parameters": [{ "type": "payload", "payload": format!("button_{i}") }],
            }));
        }

        serde_json::json!({
            "messaging_product": "whatsapp",
            "to": send.to,
            "type": "template",
            "template": {
                "name": send.template_name,
                "language": { "code": send.language },
                "components": components,
            },
        })
    }

    /// Send a template message. Returns the provider message id.
    pub async fn send_template(&self, send: &TemplateSend) -> Result<String, VitrinaError> {
        let payload = self.build_payload(send);
        let url = self.messages_url();

        let mut attempt = 0;
        let response = loop {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| VitrinaError::Vendor {
                    message: format!("WhatsApp request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
                && attempt < RATE_LIMIT_RETRIES
            {
                attempt += 1;
                warn!(attempt, "WhatsApp rate limited, backing off");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            break response;
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VitrinaError::Vendor {
                message: format!("WhatsApp send returned {status}: {body}"),
                source: None,
            });
        }

        let parsed: SendResponse = response.json().await.map_err(|e| VitrinaError::Vendor {
            message: format!("WhatsApp response was not valid JSON: {e}"),
            source: Some(Box::new(e)),
        })?;

        let message = parsed.messages.into_iter().next().ok_or_else(|| {
            VitrinaError::Vendor {
                message: "WhatsApp send returned an empty messages array".to_string(),
                source: None,
            }
        })?;

        debug!(to = %send.to, template = %send.template_name, id = %message.id, "template sent");
        Ok(message.id)
    }

    /// Check that the phone number endpoint is reachable with the current
    /// token. Used by the integration connection probe.
    pub async fn probe(&self) -> Result<(), VitrinaError> {
        let url = format!("{}/{}", self.base_url, self.phone_number_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VitrinaError::Vendor {
                message: format!("WhatsApp probe failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(VitrinaError::Vendor {
                message: format!("WhatsApp probe returned {}", response.status()),
                source: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn send_order() -> TemplateSend {
        TemplateSend {
            to: "+573001112233".to_string(),
            template_name: "confirmacion_pedido_contraentrega".to_string(),
            language: "es".to_string(),
            body_params: vec!["Ana".to_string(), "ORD-42".to_string()],
            buttons: vec!["Confirmar pedido".to_string(), "No confirmar".to_string()],
        }
    }

    #[tokio::test]
    async fn send_template_builds_cloud_api_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/12345/messages"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "+573001112233",
                "type": "template",
                "template": {
                    "name": "confirmacion_pedido_contraentrega",
                    "language": { "code": "es" },
                    "components": [
                        { "type": "body", "parameters": [
                            { "type": "text", "text": "Ana" },
                            { "type": "text", "text": "ORD-42" }
                        ]},
                        { "type": "button", "sub_type": "quick_reply", "index": "0",
                          "parameters": [{ "type": "payload", "payload": "button_0" }] },
                        { "type": "button", "sub_type": "quick_reply", "index": "1",
                          "parameters": [{ "type": "payload", "payload": "button_1" }] }
                    ]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "wamid.A1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&server.uri(), "token", "12345").unwrap();
        let id = client.send_template(&send_order()).await.unwrap();
        assert_eq!(id, "wamid.A1");
    }

    #[tokio::test]
    async fn empty_messages_array_is_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "messages": [] })),
            )
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&server.uri(), "token", "12345").unwrap();
        assert!(matches!(
            client.send_template(&send_order()).await,
            Err(VitrinaError::Vendor { .. })
        ));
    }

    #[tokio::test]
    async fn non_2xx_is_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad template"))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&server.uri(), "token", "12345").unwrap();
        let err = client.send_template(&send_order()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "wamid.A2" }]
            })))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&server.uri(), "token", "12345").unwrap();
        let id = client.send_template(&send_order()).await.unwrap();
        assert_eq!(id, "wamid.A2");
    }

    #[tokio::test]
    async fn probe_checks_phone_number_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/12345"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "12345"
            })))
            .mount(&server)
            .await;

        let client = WhatsAppClient::new(&server.uri(), "token", "12345").unwrap();
        client.probe().await.unwrap();

        let missing = WhatsAppClient::new(&server.uri(), "token", "99999").unwrap();
        assert!(missing.probe().await.is_err());
    }
}
