//! HTTP routes.
//!
//! Successful responses are wrapped as `{"data": ..., "message"?: "..."}`.

mod bank_cards;
mod catalog;
mod health;
mod notifications;
mod orders;
mod payments;
mod reports;
mod system;
mod wallet;
mod withdrawals;

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data, message: None })
}

pub(crate) fn ok_with<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        message: Some(message.into()),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // Catalog & cart
        .route("/products", post(catalog::create_product))
        .route("/products/{id}", get(catalog::get_product))
        .route("/admin/products/{id}/status", put(catalog::set_product_status))
        .route(
            "/cart",
            get(catalog::get_cart).post(catalog::add_to_cart).delete(catalog::clear_cart),
        )
        .route("/cart/items/{id}", delete(catalog::remove_item))
        // Orders
        .route("/orders", get(orders::list))
        .route("/orders/checkout", post(orders::checkout))
        .route("/orders/sold", get(orders::sold))
        .route("/orders/ready-for-withdrawal", get(orders::ready_for_withdrawal))
        .route("/orders/{id}", get(orders::get))
        .route("/orders/{id}/products", get(orders::products))
        .route("/admin/orders/status", put(orders::admin_update_status))
        // Reports
        .route("/reports", post(reports::create).get(reports::list_mine))
        .route("/reports/{id}", get(reports::get))
        .route("/reports/{id}/evidence", post(reports::add_evidence))
        .route("/admin/reports", get(reports::admin_list))
        .route("/admin/reports/{id}/action", post(reports::admin_action))
        // Withdrawals
        .route("/withdrawals", post(withdrawals::create).get(withdrawals::list_mine))
        .route("/withdrawals/statistics", get(withdrawals::statistics))
        .route("/withdrawals/{id}", get(withdrawals::get))
        .route("/admin/withdrawals", get(withdrawals::admin_list))
        .route("/admin/withdrawals/{id}/action", post(withdrawals::admin_action))
        // Wallet & payments
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/balance", get(wallet::get_balance))
        .route("/wallet/deposits", post(wallet::create_deposit))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payment-history", get(payments::list))
        .route("/payment-history/stats", get(payments::stats))
        .route("/payment-history/orders/{id}", get(payments::by_order))
        // Bank cards
        .route("/bank-cards", get(bank_cards::list).post(bank_cards::create))
        .route("/bank-cards/default", get(bank_cards::get_default))
        .route(
            "/bank-cards/{id}",
            get(bank_cards::get).put(bank_cards::update).delete(bank_cards::delete),
        )
        .route("/bank-cards/{id}/default", put(bank_cards::set_default))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete))
        // System
        .route(
            "/system-variables/discount-rate",
            get(system::get_discount_rate).put(system::set_discount_rate),
        )
        .route("/admin/scheduler/sweep", post(system::sweep))
        .with_state(state)
}
