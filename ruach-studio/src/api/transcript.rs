//! Transcript and subtitle endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{SubtitleFormat, Transcript},
    AppState, BackgroundTask,
};

#[derive(Debug, Default, Deserialize)]
pub struct ComputeTranscriptRequest {
    #[serde(default)]
    pub source_angle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubtitleQuery {
    #[serde(default)]
    pub format: Option<SubtitleFormat>,
    /// Prefix cues with the speaker label
    #[serde(default)]
    pub speakers: Option<bool>,
}

/// POST /sessions/:id/transcript
///
/// Records a `processing` transcript and returns it with 202 Accepted; the
/// provider call finishes in the background.
pub async fn compute_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<ComputeTranscriptRequest>>,
) -> ApiResult<(StatusCode, Json<Transcript>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let transcript = state
        .transcripts
        .begin(session_id, request.source_angle.as_deref())
        .await?;

    let background = state.clone();
    let pending = transcript.clone();
    tokio::spawn(async move {
        let transcript_id = pending.id;
        match background.transcripts.finish(pending).await {
            Ok(_) => {
                background
                    .clear_failure(BackgroundTask::Transcript, session_id)
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    transcript_id = %transcript_id,
                    error = %e,
                    "Background transcription failed"
                );
                background
                    .record_failure(
                        BackgroundTask::Transcript,
                        session_id,
                        format!("transcript {}: {}", transcript_id, e),
                    )
                    .await;
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(transcript)))
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Transcript>> {
    Ok(Json(state.transcripts.get_transcript(session_id).await?))
}

/// GET /sessions/:id/subtitles/:angle?format=srt|vtt&speakers=true|false
pub async fn get_subtitles(
    State(state): State<AppState>,
    Path((session_id, angle)): Path<(Uuid, String)>,
    Query(query): Query<SubtitleQuery>,
) -> ApiResult<Response> {
    let format = query.format.unwrap_or(SubtitleFormat::Srt);
    let body = state
        .transcripts
        .get_subtitle(session_id, &angle, format, query.speakers.unwrap_or(true))
        .await?;

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    let disposition = format!(
        "inline; filename=\"{}-{}.{}\"",
        session_id,
        angle,
        format.extension()
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub fn transcript_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/transcript", post(compute_transcript).get(get_transcript))
        .route("/sessions/:id/subtitles/:angle", get(get_subtitles))
}
