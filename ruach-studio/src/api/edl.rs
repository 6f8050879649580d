//! EDL compilation and approval endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiResult, models::Edl, AppState};

#[derive(Debug, Deserialize)]
pub struct ApproveEdlRequest {
    pub approved_by: String,
}

/// POST /sessions/:id/edls
///
/// Every compile produces a new version.
pub async fn compile_edl(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Edl>)> {
    let edl = state.edl.compile(session_id).await?;
    Ok((StatusCode::CREATED, Json(edl)))
}

pub async fn list_edls(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Edl>>> {
    Ok(Json(state.edl.list_edls(session_id).await?))
}

pub async fn get_edl(
    State(state): State<AppState>,
    Path((session_id, version)): Path<(Uuid, i64)>,
) -> ApiResult<Json<Edl>> {
    Ok(Json(state.edl.get_edl(session_id, version).await?))
}

pub async fn approve_edl(
    State(state): State<AppState>,
    Path((session_id, version)): Path<(Uuid, i64)>,
    Json(request): Json<ApproveEdlRequest>,
) -> ApiResult<Json<Edl>> {
    let edl = state
        .edl
        .approve(session_id, version, &request.approved_by)
        .await?;
    Ok(Json(edl))
}

pub fn edl_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/edls", post(compile_edl).get(list_edls))
        .route("/sessions/:id/edls/:version", get(get_edl))
        .route("/sessions/:id/edls/:version/approve", post(approve_edl))
}
