//! Runtime settings and operator actions.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use bazaar_core::{FeeRate, DISCOUNT_RATE_KEY};
use bazaar_market::SweepReport;

use super::{ok, ok_with, ApiResponse};
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRate {
    /// Percentage, 0 to 100.
    rate: f64,
    rate_bps: u32,
}

impl From<FeeRate> for DiscountRate {
    fn from(rate: FeeRate) -> Self {
        DiscountRate {
            rate: rate.percentage(),
            rate_bps: rate.bps(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRateRequest {
    pub rate: f64,
}

#[derive(Debug, Serialize)]
pub struct SweepResult {
    due: usize,
    promoted: usize,
    failed: usize,
}

impl From<SweepReport> for SweepResult {
    fn from(r: SweepReport) -> Self {
        SweepResult {
            due: r.due,
            promoted: r.promoted,
            failed: r.failed,
        }
    }
}

/// GET /system-variables/discount-rate
pub async fn get_discount_rate(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<DiscountRate>>> {
    let rate = state.market.system_variables().fee_rate().await?;
    Ok(ok(rate.into()))
}

/// PUT /system-variables/discount-rate
pub async fn set_discount_rate(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<SetRateRequest>,
) -> ApiResult<Json<ApiResponse<DiscountRate>>> {
    let variables = state.market.system_variables();
    variables.set(DISCOUNT_RATE_KEY, req.rate).await?;
    let rate = variables.fee_rate().await?;
    tracing::info!(admin_id = %admin.admin_id, bps = rate.bps(), "Discount rate changed");
    Ok(ok_with(rate.into(), "Discount rate updated"))
}

/// POST /admin/scheduler/sweep
pub async fn sweep(State(state): State<AppState>, admin: AdminUser) -> ApiResult<Json<ApiResponse<SweepResult>>> {
    tracing::info!(admin_id = %admin.admin_id, "Manual order sweep requested");
    match state.sweeps.trigger().await {
        Some(report) => Ok(ok(report?.into())),
        None => Err(ApiError::new(ErrorCode::Conflict, "A sweep is already running")),
    }
}
