//! Asset registration and transcoding-worker callbacks

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{Asset, Renditions},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterAssetRequest {
    pub angle: String,
    pub filename: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadCompleteRequest {
    #[serde(default)]
    pub original_location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscodeCompleteRequest {
    pub duration_ms: i64,
    #[serde(default)]
    pub renditions: Renditions,
}

/// Body of both failure callbacks
#[derive(Debug, Deserialize)]
pub struct FailureReport {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub session_id: Uuid,
    pub ready: bool,
    pub assets: Vec<Asset>,
}

pub async fn register_asset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RegisterAssetRequest>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    let asset = state
        .ingestion
        .register_asset(session_id, &request.angle, &request.filename)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn list_assets(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Asset>>> {
    Ok(Json(state.ingestion.list_assets(session_id).await?))
}

pub async fn upload_complete(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
    body: Option<Json<UploadCompleteRequest>>,
) -> ApiResult<Json<Asset>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let asset = state
        .ingestion
        .report_upload_complete(session_id, &angle, request.original_location)
        .await?;
    Ok(Json(asset))
}

pub async fn upload_failed(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
    Json(report): Json<FailureReport>,
) -> ApiResult<Json<Asset>> {
    let asset = state
        .ingestion
        .report_upload_failed(session_id, &angle, &report.reason)
        .await?;
    Ok(Json(asset))
}

pub async fn transcode_complete(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
    Json(request): Json<TranscodeCompleteRequest>,
) -> ApiResult<Json<Asset>> {
    let asset = state
        .ingestion
        .report_transcode_complete(session_id, &angle, request.duration_ms, request.renditions)
        .await?;
    Ok(Json(asset))
}

pub async fn transcode_failed(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
    Json(report): Json<FailureReport>,
) -> ApiResult<Json<Asset>> {
    let asset = state
        .ingestion
        .report_transcode_failed(session_id, &angle, &report.reason)
        .await?;
    Ok(Json(asset))
}

pub async fn exclude_asset(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
) -> ApiResult<Json<Asset>> {
    Ok(Json(state.ingestion.exclude_asset(session_id, &angle).await?))
}

pub async fn readiness(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ReadinessResponse>> {
    let assets = state.ingestion.list_assets(session_id).await?;
    Ok(Json(ReadinessResponse {
        session_id,
        ready: crate::services::ingestion::all_assets_ready(&assets),
        assets,
    }))
}

pub fn asset_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/assets", post(register_asset).get(list_assets))
        .route("/sessions/:id/readiness", get(readiness))
        .route("/sessions/:id/assets/:angle/upload-complete", post(upload_complete))
        .route("/sessions/:id/assets/:angle/upload-failed", post(upload_failed))
        .route("/sessions/:id/assets/:angle/transcode-complete", post(transcode_complete))
        .route("/sessions/:id/assets/:angle/transcode-failed", post(transcode_failed))
        .route("/sessions/:id/assets/:angle/exclude", post(exclude_asset))
}
