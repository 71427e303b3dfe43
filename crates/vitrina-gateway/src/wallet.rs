// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wallet routes under `/pay/wallet`, including the operator-only admin
//! surface.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use vitrina_auth::Subject;
use vitrina_storage::{Wallet, WalletTransaction};

use crate::auth::require_super_admin;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct BusinessQuery {
    #[serde(default)]
    pub business_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    pub amount: f64,
    #[serde(default)]
    pub business_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GuideDebitRequest {
    pub amount: f64,
    pub tracking_number: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualDebitRequest {
    pub business_id: i64,
    pub amount: f64,
    pub reference: String,
}

/// GET /pay/wallet/balance
pub async fn balance(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<Wallet>, ApiError> {
    let business_id = subject.effective_business_id(query.business_id)?;
    Ok(Json(state.wallet.get_wallet(business_id).await?))
}

/// POST /pay/wallet/recharge
///
/// Opens a PENDING recharge and returns the static-QR payload (the
/// transaction reference) the customer pays against.
pub async fn recharge(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<RechargeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let business_id = subject.effective_business_id(body.business_id)?;
    let tx = state.wallet.recharge(business_id, body.amount).await?;
    Ok(Json(json!({
        "qr_code": tx.reference,
        "transaction": tx,
    })))
}

/// GET /pay/wallet/history
pub async fn history(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    let business_id = subject.effective_business_id(query.business_id)?;
    Ok(Json(
        state.wallet.transactions_for_business(business_id).await?,
    ))
}

/// POST /pay/wallet/debit-guide
pub async fn debit_guide(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<GuideDebitRequest>,
) -> Result<Json<WalletTransaction>, ApiError> {
    let business_id = subject.effective_business_id(None)?;
    Ok(Json(
        state
            .wallet
            .debit_for_guide(business_id, body.amount, &body.tracking_number)
            .await?,
    ))
}

/// GET /pay/wallet/all
pub async fn all_wallets(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Vec<Wallet>>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(state.wallet.list_wallets().await?))
}

/// GET /pay/wallet/admin/pending-requests
pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(state.wallet.pending_transactions().await?))
}

/// GET /pay/wallet/admin/processed-requests
pub async fn processed_requests(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(state.wallet.processed_transactions().await?))
}

/// POST /pay/wallet/admin/requests/:id/approve
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<WalletTransaction>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(state.wallet.approve_transaction(id).await?))
}

/// POST /pay/wallet/admin/requests/:id/reject
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(id): Path<i64>,
) -> Result<Json<WalletTransaction>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(state.wallet.reject_transaction(id).await?))
}

/// POST /pay/wallet/admin/manual-debit
pub async fn manual_debit(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<ManualDebitRequest>,
) -> Result<Json<WalletTransaction>, ApiError> {
    require_super_admin(&subject)?;
    Ok(Json(
        state
            .wallet
            .manual_debit(body.business_id, body.amount, &body.reference)
            .await?,
    ))
}

/// DELETE /pay/wallet/admin/history/:business_id
pub async fn clear_history(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(business_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_super_admin(&subject)?;
    let removed = state.wallet.clear_recharge_history(business_id).await?;
    Ok(Json(json!({ "removed": removed })))
}
