//! Synchronization endpoints
//!
//! Compute is accepted after its preconditions are checked and runs in the
//! background; the outcome arrives as `SyncCompleted`/`SyncFailed` events.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{error::ApiResult, models::SyncResult, AppState, BackgroundTask};

#[derive(Debug, Default, Deserialize)]
pub struct ComputeSyncRequest {
    #[serde(default)]
    pub anchor_angle: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub session_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ApproveSyncRequest {
    pub approved_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectSyncRequest {
    pub offsets_ms: BTreeMap<String, i64>,
    pub corrected_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /sessions/:id/sync
///
/// Returns 202 Accepted once the session may be synced.
pub async fn compute_sync(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<ComputeSyncRequest>>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state
        .sync
        .check_compute(session_id, request.anchor_angle.as_deref())
        .await?;

    let background = state.clone();
    tokio::spawn(async move {
        tracing::info!(session_id = %session_id, "Background sync computation started");

        match background
            .sync
            .compute(session_id, request.anchor_angle.as_deref())
            .await
        {
            Ok(_) => {
                background
                    .clear_failure(BackgroundTask::Sync, session_id)
                    .await;
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Background sync computation failed");
                background
                    .record_failure(BackgroundTask::Sync, session_id, e.to_string())
                    .await;
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            session_id,
            status: "accepted",
        }),
    ))
}

pub async fn get_sync(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SyncResult>> {
    Ok(Json(state.sync.get_result(session_id).await?))
}

pub async fn approve_sync(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ApproveSyncRequest>,
) -> ApiResult<Json<SyncResult>> {
    let result = state
        .sync
        .approve(session_id, &request.approved_by, request.notes)
        .await?;
    Ok(Json(result))
}

/// Approval is cleared; the previously approved offsets stay active until re-approval
pub async fn correct_sync(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CorrectSyncRequest>,
) -> ApiResult<Json<SyncResult>> {
    let result = state
        .sync
        .correct(session_id, request.offsets_ms, &request.corrected_by, request.notes)
        .await?;
    Ok(Json(result))
}

pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/sync", post(compute_sync).get(get_sync))
        .route("/sessions/:id/sync/approve", post(approve_sync))
        .route("/sessions/:id/sync/correct", post(correct_sync))
}
