use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use super::ok;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    database: bool,
    version: &'static str,
}

/// GET /health - liveness plus a database round trip.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.market.db().health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = Health {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    };
    (status, ok(body))
}
