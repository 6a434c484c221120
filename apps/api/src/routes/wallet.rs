use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use bazaar_core::{Money, PaymentHistory, Wallet};

use super::{ok, ok_with, ApiResponse};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    balance_cents: i64,
    formatted: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount_cents: i64,
}

/// GET /wallet - created on first access.
pub async fn get_wallet(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Wallet>>> {
    Ok(ok(state.market.wallets().get_or_create(&user.user_id).await?))
}

/// GET /wallet/balance
pub async fn get_balance(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Balance>>> {
    let balance = state.market.wallets().get_balance(&user.user_id).await?;
    Ok(ok(Balance {
        balance_cents: balance.cents(),
        formatted: balance.to_string(),
    }))
}

/// POST /wallet/deposits - pending until the gateway calls back.
pub async fn create_deposit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DepositRequest>,
) -> ApiResult<Json<ApiResponse<PaymentHistory>>> {
    let row = state
        .market
        .payments()
        .create_deposit(&user.user_id, Money::from_cents(req.amount_cents))
        .await?;
    Ok(ok_with(row, "Deposit created"))
}
