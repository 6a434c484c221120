//! Checkout and order queries.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use bazaar_core::{Order, OrderProducts, OrderStatus, SellerOrderView};

use super::{ok, ok_with, ApiResponse};
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Buy only these cart lines; the whole cart when absent.
    #[serde(default)]
    pub product_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusRequest {
    pub order_ids: Vec<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    updated: u64,
}

/// POST /orders/checkout
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = state
        .market
        .orders()
        .checkout(&user.user_id, req.product_ids.as_deref())
        .await?;
    Ok(ok_with(order, "Order placed"))
}

/// GET /orders
pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Vec<Order>>>> {
    Ok(ok(state.market.orders().get_orders(&user.user_id).await?))
}

/// GET /orders/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    Ok(ok(state.market.orders().get_order(&id, &user.user_id).await?))
}

/// GET /orders/{id}/products
pub async fn products(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<OrderProducts>>> {
    Ok(ok(state.market.orders().get_order_products(&id, &user.user_id).await?))
}

/// GET /orders/sold
pub async fn sold(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Vec<SellerOrderView>>>> {
    Ok(ok(state.market.orders().get_sold_orders(&user.user_id).await?))
}

/// GET /orders/ready-for-withdrawal
pub async fn ready_for_withdrawal(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<SellerOrderView>>>> {
    Ok(ok(state.market.orders().get_ready_for_withdrawal(&user.user_id).await?))
}

/// PUT /admin/orders/status - unconditional batch update.
pub async fn admin_update_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<BatchStatusRequest>,
) -> ApiResult<Json<ApiResponse<Updated>>> {
    let updated = state
        .market
        .orders()
        .update_orders_status(&req.order_ids, req.status)
        .await?;
    tracing::info!(admin_id = %admin.admin_id, status = %req.status, updated, "Admin order status update");
    Ok(ok(Updated { updated }))
}
