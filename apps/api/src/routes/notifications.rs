use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use bazaar_core::Notification;

use super::{ok, ApiResponse};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboxQuery {
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct Count {
    count: i64,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<InboxQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Notification>>>> {
    Ok(ok(state.market.notifications().list(&user.user_id, q.unread_only).await?))
}

pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Count>>> {
    let count = state.market.notifications().unread_count(&user.user_id).await?;
    Ok(ok(Count { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.market.notifications().mark_read(&id, &user.user_id).await?;
    Ok(ok(()))
}

pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ApiResponse<Updated>>> {
    let updated = state.market.notifications().mark_all_read(&user.user_id).await?;
    Ok(ok(Updated { updated }))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.market.notifications().delete(&id, &user.user_id).await?;
    Ok(ok(()))
}
