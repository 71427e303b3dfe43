// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment routes under `/pay/transactions`, plus the SSE event stream.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Extension, Json};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use vitrina_auth::Subject;
use vitrina_bus::PAY_EVENTS;
use vitrina_payments::CreatePayment;
use vitrina_storage::PaymentTransaction;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub gateway_code: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub business_id: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// POST /pay/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<PaymentTransaction>), ApiError> {
    let business_id = subject.effective_business_id(None)?;
    let tx = state
        .payments
        .create_payment(CreatePayment {
            business_id,
            amount: body.amount,
            currency: body.currency,
            gateway_code: body.gateway_code,
            payment_method: body.payment_method,
            description: body.description,
            callback_url: body.callback_url,
            metadata: body.metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /pay/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let business_id = subject.effective_business_id(query.business_id)?;
    let (items, total) = state
        .payments
        .list_payments(business_id, query.page, query.page_size)
        .await?;
    Ok(Json(json!({
        "items": items,
        "total": total,
        "page": query.page,
        "page_size": query.page_size,
    })))
}

/// GET /pay/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentTransaction>, ApiError> {
    let tx = state.payments.get_payment(id).await?;
    if let Some(own) = subject.scope.business_id() {
        if tx.business_id != own {
            // Hidden, not forbidden: cross-tenant ids are unguessable.
            return Err(vitrina_core::VitrinaError::NotFound(format!(
                "payment transaction {id} not found"
            ))
            .into());
        }
    }
    Ok(Json(tx))
}

/// GET /pay/events
///
/// SSE stream of payment lifecycle events. Business callers only see their
/// own tenant; platform callers see everything.
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.bus.subscribe(PAY_EVENTS);
    let visible = subject.scope.business_id();

    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if let Some(own) = visible {
                        if envelope.business_id != own {
                            continue;
                        }
                    }
                    let event = Event::default().event(envelope.event_type.clone());
                    let event = match serde_json::to_string(&envelope) {
                        Ok(data) => event.data(data),
                        Err(_) => continue,
                    };
                    return Some((Ok(event), rx));
                }
                // A lagged stream skips ahead rather than terminating.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
