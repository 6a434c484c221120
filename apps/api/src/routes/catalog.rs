//! Products and the buyer's cart.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use bazaar_core::{CartItem, CartView, Product, ProductStatus};

use super::{ok, ok_with, ApiResponse};
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub title: String,
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProductStatusRequest {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    let product = state
        .market
        .catalog()
        .create_product(&user.user_id, &req.title, req.price_cents)
        .await?;
    Ok(ok_with(product, "Product created"))
}

/// GET /products/{id}
pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ApiResponse<Product>>> {
    Ok(ok(state.market.catalog().get_product(&id).await?))
}

/// PUT /admin/products/{id}/status
pub async fn set_product_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<ProductStatusRequest>,
) -> ApiResult<Json<ApiResponse<Product>>> {
    Ok(ok(state.market.catalog().set_product_status(&id, req.status).await?))
}

/// GET /cart
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<CartView>>> {
    Ok(ok(state.market.catalog().get_cart(&user.user_id).await?))
}

/// POST /cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<Json<ApiResponse<CartItem>>> {
    let item = state
        .market
        .catalog()
        .add_to_cart(&user.user_id, &req.product_id, req.quantity)
        .await?;
    Ok(ok_with(item, "Added to cart"))
}

/// DELETE /cart/items/{id}
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.market.catalog().remove_item(&user.user_id, &id).await?;
    Ok(ok_with((), "Item removed"))
}

/// DELETE /cart
pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<u64>>> {
    let removed = state.market.catalog().clear_cart(&user.user_id).await?;
    Ok(ok_with(removed, "Cart cleared"))
}
