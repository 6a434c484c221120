use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use bazaar_core::BankCard;
use bazaar_market::{BankCardUpdate, NewBankCard};

use super::{ok, ok_with, ApiResponse};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCardRequest {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub is_default: Option<bool>,
}

pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Vec<BankCard>>>> {
    Ok(ok(state.market.bank_cards().list(&user.user_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCardRequest>,
) -> ApiResult<Json<ApiResponse<BankCard>>> {
    let card = state
        .market
        .bank_cards()
        .create(
            &user.user_id,
            NewBankCard {
                bank_name: req.bank_name,
                account_number: req.account_number,
                account_holder: req.account_holder,
                is_default: req.is_default,
            },
        )
        .await?;
    Ok(ok_with(card, "Bank card added"))
}

pub async fn get_default(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<BankCard>>> {
    Ok(ok(state.market.bank_cards().get_default(&user.user_id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<BankCard>>> {
    Ok(ok(state.market.bank_cards().get(&id, &user.user_id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCardRequest>,
) -> ApiResult<Json<ApiResponse<BankCard>>> {
    let changes = BankCardUpdate {
        bank_name: req.bank_name,
        account_number: req.account_number,
        account_holder: req.account_holder,
        is_default: req.is_default,
    };
    let card = state.market.bank_cards().update(&id, &user.user_id, changes).await?;
    Ok(ok_with(card, "Bank card updated"))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.market.bank_cards().delete(&id, &user.user_id).await?;
    Ok(ok_with((), "Bank card deleted"))
}

pub async fn set_default(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<BankCard>>> {
    let card = state.market.bank_cards().set_default(&id, &user.user_id).await?;
    Ok(ok_with(card, "Default bank card updated"))
}
