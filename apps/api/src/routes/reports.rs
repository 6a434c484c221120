//! Buyer disputes and their resolution.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use bazaar_core::{Report, ReportAction, ReportStatus};
use bazaar_market::NewReport;

use super::{ok, ok_with, ApiResponse};
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub order_id: String,
    pub product_id: String,
    pub reason: String,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceRequest {
    pub evidence: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportActionRequest {
    pub action: ReportAction,
    #[serde(default)]
    pub admin_response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ReportStatus>,
}

/// POST /reports
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<Json<ApiResponse<Report>>> {
    let report = state
        .market
        .reports()
        .create_report(
            &user.user_id,
            NewReport {
                order_id: req.order_id,
                product_id: req.product_id,
                reason: req.reason,
                evidence_urls: req.evidence,
            },
        )
        .await?;
    Ok(ok_with(report, "Report submitted"))
}

/// GET /reports - as buyer or seller.
pub async fn list_mine(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Vec<Report>>>> {
    Ok(ok(state.market.reports().get_my_reports(&user.user_id).await?))
}

/// GET /reports/{id}
pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Report>>> {
    Ok(ok(state.market.reports().get_report(&id, &user.user_id).await?))
}

/// POST /reports/{id}/evidence
pub async fn add_evidence(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<EvidenceRequest>,
) -> ApiResult<Json<ApiResponse<Report>>> {
    let report = state
        .market
        .reports()
        .add_evidence(&id, &user.user_id, &req.evidence, req.note.as_deref())
        .await?;
    Ok(ok_with(report, "Evidence added"))
}

/// GET /admin/reports?status=
pub async fn admin_list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<ApiResponse<Vec<Report>>>> {
    Ok(ok(state.market.reports().get_all_reports(filter.status).await?))
}

/// POST /admin/reports/{id}/action
pub async fn admin_action(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<ReportActionRequest>,
) -> ApiResult<Json<ApiResponse<Report>>> {
    let report = state
        .market
        .reports()
        .handle_admin_action(&id, &admin.admin_id, req.action, req.admin_response.as_deref())
        .await?;
    Ok(ok_with(report, format!("Report {}", report_outcome(req.action))))
}

fn report_outcome(action: ReportAction) -> &'static str {
    match action {
        ReportAction::Approved => "approved",
        ReportAction::Rejected => "rejected",
        ReportAction::NeedMoreInfo => "awaiting more information",
    }
}
