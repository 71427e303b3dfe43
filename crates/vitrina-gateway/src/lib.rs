// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Axum HTTP facade.
//!
//! Three route groups: public (health, login, the provider webhook),
//! authenticated REST routes guarded by [`auth::require_auth`], and the SSE
//! event stream. All domain logic lives in the service crates; handlers
//! translate between HTTP and service calls and nothing else.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod integrations;
pub mod payments;
pub mod wallet;
pub mod webhook;

use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vitrina_auth::AuthService;
use vitrina_bus::EventBus;
use vitrina_conversations::ConversationService;
use vitrina_core::VitrinaError;
use vitrina_integrations::IntegrationService;
use vitrina_payments::PaymentOrchestrator;
use vitrina_wallet::WalletService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub payments: PaymentOrchestrator,
    pub wallet: WalletService,
    pub integrations: IntegrationService,
    pub conversations: ConversationService,
    pub bus: EventBus,
    /// App secret verifying `X-Hub-Signature-256` on inbound webhooks.
    /// `None` disables enforcement.
    pub whatsapp_app_secret: Option<String>,
    pub cookie_max_age_days: i64,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(accounts::login))
        .route(
            "/integrations/whatsapp/webhook",
            post(webhook::whatsapp_webhook),
        )
        .with_state(state.clone());

    let api = Router::new()
        .route("/auth/verify", get(accounts::verify))
        .route("/auth/roles-permissions", get(accounts::roles_permissions))
        .route("/auth/change-password", post(accounts::change_password))
        .route("/auth/generate-password", post(accounts::generate_password))
        .route("/auth/business-token", post(accounts::business_token))
        .route(
            "/pay/transactions",
            post(payments::create_transaction).get(payments::list_transactions),
        )
        .route("/pay/transactions/{id}", get(payments::get_transaction))
        .route("/pay/events", get(payments::event_stream))
        .route("/pay/wallet/balance", get(wallet::balance))
        .route("/pay/wallet/recharge", post(wallet::recharge))
        .route("/pay/wallet/history", get(wallet::history))
        .route("/pay/wallet/debit-guide", post(wallet::debit_guide))
        .route("/pay/wallet/all", get(wallet::all_wallets))
        .route(
            "/pay/wallet/admin/pending-requests",
            get(wallet::pending_requests),
        )
        .route(
            "/pay/wallet/admin/processed-requests",
            get(wallet::processed_requests),
        )
        .route(
            "/pay/wallet/admin/requests/{id}/approve",
            post(wallet::approve_request),
        )
        .route(
            "/pay/wallet/admin/requests/{id}/reject",
            post(wallet::reject_request),
        )
        .route("/pay/wallet/admin/manual-debit", post(wallet::manual_debit))
        .route(
            "/pay/wallet/admin/history/{business_id}",
            delete(wallet::clear_history),
        )
        .route(
            "/integrations",
            get(integrations::list).post(integrations::create),
        )
        .route(
            "/integrations/{id}",
            get(integrations::get)
                .put(integrations::update)
                .delete(integrations::delete),
        )
        .route("/integrations/type/{type}", get(integrations::get_by_type))
        .route("/integrations/{id}/test", post(integrations::test_connection))
        .route("/integrations/{id}/activate", put(integrations::activate))
        .route(
            "/integrations/{id}/deactivate",
            put(integrations::deactivate),
        )
        .route(
            "/integrations/{id}/set-default",
            put(integrations::set_default),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(api)
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the cancellation token fires.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> Result<(), VitrinaError> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VitrinaError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| VitrinaError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use hmac::{Hmac, Mac};
    use http_body_util::BodyExt;
    use sha2::Sha256;
    use tempfile::tempdir;
    use tower::ServiceExt;
    use vitrina_auth::{hash_password, TokenAuthority};
    use vitrina_broker::{Broker, PAY_REQUESTS, PAY_RESPONSES};
    use vitrina_conversations::TemplateSender;
    use vitrina_integrations::{ConfigCache, ProberRegistry};
    use vitrina_storage::Database;
    use vitrina_vault::CredentialVault;
    use vitrina_whatsapp::TemplateSend;

    struct NullSender;

    #[async_trait]
    impl TemplateSender for NullSender {
        async fn send(&self, _send: &TemplateSend) -> Result<String, VitrinaError> {
            Ok("wamid.test".to_string())
        }
    }

    const APP_SECRET: &str = "webhook-secret";

    async fn setup() -> (Router, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let hash = hash_password("correct-horse").unwrap();
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(&format!(
                    "INSERT INTO businesses (code, name, business_type_id) VALUES ('BIZ-7', 'Tienda 7', 2);
                     INSERT INTO users (email, password_hash, full_name)
                       VALUES ('ana@example.com', '{hash}', 'Ana');
                     INSERT INTO users (email, password_hash, full_name)
                       VALUES ('root@example.com', '{hash}', 'Root');
                     INSERT INTO roles (name) VALUES ('admin');
                     INSERT INTO staff (user_id, business_id, role_id) VALUES (1, 1, 1);
                     INSERT INTO staff (user_id, business_id, role_id) VALUES (2, NULL, 1);"
                ))?;
                Ok(())
            })
            .await
            .unwrap();

        let broker = Broker::new(db.clone());
        broker.declare_queue(PAY_REQUESTS).unwrap();
        broker.declare_queue(PAY_RESPONSES).unwrap();

        let bus = EventBus::new(16);
        let authority = TokenAuthority::new("test-secret-0123456789").unwrap();
        let auth = AuthService::new(db.clone(), authority);
        let vault = CredentialVault::from_hex(&"ab".repeat(32)).unwrap();

        let state = AppState {
            auth,
            payments: PaymentOrchestrator::new(db.clone(), broker, bus.clone()),
            wallet: WalletService::new(db.clone()),
            integrations: IntegrationService::new(
                db.clone(),
                vault,
                ConfigCache::new(std::time::Duration::from_secs(60)),
                ProberRegistry::new(),
            ),
            conversations: ConversationService::new(db.clone(), bus.clone(), Arc::new(NullSender)),
            bus,
            whatsapp_app_secret: Some(APP_SECRET.to_string()),
            cookie_max_age_days: 7,
        };
        (build_router(state), db, dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(router: &Router, email: &str) -> String {
        let response = router
            .clone()
            .oneshot(
                Request::post("/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(
                        r#"{{"email":"{email}","password":"correct-horse"}}"#
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session_token="));
        assert!(cookie.contains("HttpOnly"));
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    fn authed(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
        request.header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_rejected() {
        let (router, db, _dir) = setup().await;
        let response = router
            .oneshot(Request::get("/pay/wallet/balance").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn health_is_public() {
        let (router, db, _dir) = setup().await;
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn login_token_authenticates_requests() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        let response = router
            .clone()
            .oneshot(authed(Request::get("/auth/verify"), &token).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["business_id"], 1);
        assert_eq!(body["is_super_admin"], false);

        // The cookie works as well as the bearer header.
        let response = router
            .oneshot(
                Request::get("/auth/verify")
                    .header(header::COOKIE, format!("session_token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn payment_creation_round_trips() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        let response = router
            .clone()
            .oneshot(
                authed(Request::post("/pay/transactions"), &token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"amount": 25000.0, "gateway_code": "nequi"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let reference = body["reference"].as_str().unwrap();
        assert_eq!(reference.len(), 32);
        let id = body["id"].as_i64().unwrap();

        let response = router
            .oneshot(
                authed(Request::get(format!("/pay/transactions/{id}")), &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "pending");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transaction_list_defaults_to_the_first_page() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(
                    authed(Request::post("/pay/transactions"), &token)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(
                            r#"{"amount": 25000.0, "gateway_code": "nequi"}"#,
                        ))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        // No query string: the first page of a small tenant holds every row.
        let response = router
            .oneshot(
                authed(Request::get("/pay/transactions"), &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["page"], 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_gateway_is_a_400() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        let response = router
            .oneshot(
                authed(Request::post("/pay/transactions"), &token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"amount": 25000.0, "gateway_code": "stripe"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "validation_error");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recharge_below_minimum_is_a_400() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        let response = router
            .oneshot(
                authed(Request::post("/pay/wallet/recharge"), &token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"amount": 14999.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recharge_returns_qr_payload() {
        let (router, db, _dir) = setup().await;
        let token = login(&router, "ana@example.com").await;

        let response = router
            .oneshot(
                authed(Request::post("/pay/wallet/recharge"), &token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"amount": 20000.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["qr_code"].as_str().unwrap().starts_with("WR-"));
        assert_eq!(body["transaction"]["status"], "PENDING");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn admin_routes_require_platform_scope() {
        let (router, db, _dir) = setup().await;
        let business = login(&router, "ana@example.com").await;
        let platform = login(&router, "root@example.com").await;

        let response = router
            .clone()
            .oneshot(
                authed(Request::get("/pay/wallet/all"), &business)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .oneshot(
                authed(Request::get("/pay/wallet/all"), &platform)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn integration_mutations_are_platform_only() {
        let (router, db, _dir) = setup().await;
        let business = login(&router, "ana@example.com").await;

        let response = router
            .oneshot(
                authed(Request::post("/integrations"), &business)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"code":"wa-main","integration_type":"whatsapp","category":"messaging","config":{}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        db.close().await.unwrap();
    }

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(APP_SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn webhook_enforces_signature_but_always_accepts_valid_posts() {
        let (router, db, _dir) = setup().await;
        let body = r#"{"entry": []}"#;

        let response = router
            .clone()
            .oneshot(
                Request::post("/integrations/whatsapp/webhook")
                    .header("x-hub-signature-256", "sha256=deadbeef")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(
                Request::post("/integrations/whatsapp/webhook")
                    .header("x-hub-signature-256", sign(body))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // A malformed body past the signature is still a 200.
        let garbage = "not json";
        let response = router
            .oneshot(
                Request::post("/integrations/whatsapp/webhook")
                    .header("x-hub-signature-256", sign(garbage))
                    .body(Body::from(garbage))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        db.close().await.unwrap();
    }
}
