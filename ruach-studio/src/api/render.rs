//! Render job endpoints
//!
//! Caller-facing operations identify the user with the `X-User-Id` header and
//! are rate limited per (user, operation class). Worker callbacks are not.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{RenderArtifacts, RenderJob, RenderJobStatus},
    AppState,
};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, taken from the `X-User-Id` header
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| UserId(user.to_string()))
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", USER_ID_HEADER)))
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRenderRequest {
    pub edl_version: i64,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct ProgressReport {
    pub status: RenderJobStatus,
    pub progress: f64,
}

#[derive(Debug, Deserialize)]
pub struct RenderFailure {
    pub reason: String,
}

pub async fn submit_render(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitRenderRequest>,
) -> ApiResult<(StatusCode, Json<RenderJob>)> {
    let job = state
        .render
        .submit(&user_id, session_id, request.edl_version, request.priority)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_renders(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RenderJob>>> {
    Ok(Json(state.render.list(&user_id, session_id).await?))
}

pub async fn render_status(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<RenderJob>> {
    Ok(Json(state.render.status(&user_id, job_id).await?))
}

pub async fn cancel_render(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<RenderJob>> {
    Ok(Json(state.render.cancel(&user_id, job_id).await?))
}

pub async fn report_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(report): Json<ProgressReport>,
) -> ApiResult<Json<RenderJob>> {
    let job = state
        .render
        .report_progress(job_id, report.status, report.progress)
        .await?;
    Ok(Json(job))
}

pub async fn complete_render(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(artifacts): Json<RenderArtifacts>,
) -> ApiResult<Json<RenderJob>> {
    Ok(Json(state.render.complete(job_id, artifacts).await?))
}

pub async fn fail_render(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(failure): Json<RenderFailure>,
) -> ApiResult<Json<RenderJob>> {
    Ok(Json(state.render.fail(job_id, &failure.reason).await?))
}

pub fn render_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/renders", post(submit_render).get(list_renders))
        .route("/renders/:job_id", get(render_status))
        .route("/renders/:job_id/cancel", post(cancel_render))
        .route("/renders/:job_id/progress", post(report_progress))
        .route("/renders/:job_id/complete", post(complete_render))
        .route("/renders/:job_id/fail", post(fail_render))
}
