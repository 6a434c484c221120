//! Seller payouts.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use bazaar_core::{Withdrawal, WithdrawalAction, WithdrawalStats, WithdrawalStatus};
use bazaar_market::NewWithdrawal;

use super::{ok, ok_with, ApiResponse};
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    pub bank_card_id: String,
    pub order_ids: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalActionRequest {
    pub action: WithdrawalAction,
    #[serde(default)]
    pub admin_response: Option<String>,
    /// Transfer receipts; required to approve.
    #[serde(default)]
    pub payment_proof: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<WithdrawalStatus>,
}

/// POST /withdrawals
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateWithdrawalRequest>,
) -> ApiResult<Json<ApiResponse<Withdrawal>>> {
    let withdrawal = state
        .market
        .withdrawals()
        .create_withdrawal(
            &user.user_id,
            NewWithdrawal {
                bank_card_id: req.bank_card_id,
                order_ids: req.order_ids,
                note: req.note,
            },
        )
        .await?;
    Ok(ok_with(withdrawal, "Withdrawal requested"))
}

/// GET /withdrawals
pub async fn list_mine(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Vec<Withdrawal>>>> {
    Ok(ok(state.market.withdrawals().get_my_withdrawals(&user.user_id).await?))
}

/// GET /withdrawals/statistics?year=&month=
pub async fn statistics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<StatsQuery>,
) -> ApiResult<Json<ApiResponse<WithdrawalStats>>> {
    let stats = state
        .market
        .withdrawals()
        .statistics(&user.user_id, q.year, q.month)
        .await?;
    Ok(ok(stats))
}

/// GET /withdrawals/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Withdrawal>>> {
    Ok(ok(state.market.withdrawals().get_withdrawal(&id, &user.user_id).await?))
}

/// GET /admin/withdrawals?status=
pub async fn admin_list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<ApiResponse<Vec<Withdrawal>>>> {
    Ok(ok(state.market.withdrawals().get_all_withdrawals(filter.status).await?))
}

/// POST /admin/withdrawals/{id}/action
pub async fn admin_action(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<WithdrawalActionRequest>,
) -> ApiResult<Json<ApiResponse<Withdrawal>>> {
    let withdrawal = state
        .market
        .withdrawals()
        .handle_admin_action(
            &id,
            &admin.admin_id,
            req.action,
            req.admin_response.as_deref(),
            &req.payment_proof,
        )
        .await?;
    let message = match req.action {
        WithdrawalAction::Approved => "Withdrawal approved",
        WithdrawalAction::Rejected => "Withdrawal rejected",
    };
    Ok(ok_with(withdrawal, message))
}
