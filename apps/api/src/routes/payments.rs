//! Payment history and the gateway webhook.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use bazaar_core::{Money, Page, PaymentHistory, PaymentStats};
use bazaar_market::DepositSettlement;

use super::{ok, ok_with, ApiResponse};
use crate::auth::{AuthUser, GatewayCaller};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOutcome {
    Success,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub transaction_id: String,
    pub status: GatewayOutcome,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// POST /payments/webhook
pub async fn webhook(
    State(state): State<AppState>,
    _gateway: GatewayCaller,
    Json(req): Json<WebhookRequest>,
) -> ApiResult<Json<ApiResponse<PaymentHistory>>> {
    let success = matches!(req.status, GatewayOutcome::Success);
    let row = state
        .market
        .payments()
        .settle_deposit(DepositSettlement {
            transaction_id: req.transaction_id,
            success,
            reference: req.reference,
            amount: req.amount_cents.map(Money::from_cents),
        })
        .await?;
    let message = if success { "Deposit completed" } else { "Deposit failed" };
    Ok(ok_with(row, message))
}

/// GET /payment-history?page=&limit=
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<PageQuery>,
) -> ApiResult<Json<ApiResponse<Page<PaymentHistory>>>> {
    Ok(ok(state
        .market
        .payments()
        .list_by_user(&user.user_id, q.page, q.limit)
        .await?))
}

/// GET /payment-history/stats
pub async fn stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<PaymentStats>>> {
    Ok(ok(state.market.payments().stats(&user.user_id).await?))
}

/// GET /payment-history/orders/{id}
pub async fn by_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<PaymentHistory>>>> {
    Ok(ok(state.market.payments().list_by_order(&id, &user.user_id).await?))
}
