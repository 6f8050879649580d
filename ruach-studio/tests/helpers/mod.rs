//! Test helper utilities
//!
//! Shared fixtures for driving ruach-studio end to end

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;

pub use audio_generator::{write_mixed_rate_pair, write_offset_pair, MixedRateConfig, NoiseConfig};
pub use fakes::{FailingProvider, LetterAudio, ScriptedAligner};

use axum::{body::Body, http::Request, response::Response, Router};
use http_body_util::BodyExt;
use ruach_common::events::EventBus;
use ruach_studio::config::{RateBudget, StudioConfig};
use ruach_studio::models::Renditions;
use ruach_studio::services::{InMemoryCounterStore, MockTranscriptionProvider, TranscriptionProvider};
use ruach_studio::{build_router, AppState, Collaborators};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Every session angle reports this duration on transcode
pub const ANGLE_DURATION_MS: i64 = 60_000;

pub fn test_config() -> StudioConfig {
    let mut config = StudioConfig::default();
    config.rate_limits.create = RateBudget { limit: 50, window_secs: 60 };
    config.rate_limits.status = RateBudget { limit: 50, window_secs: 60 };
    config.rate_limits.cancel = RateBudget { limit: 50, window_secs: 60 };
    config.rate_limits.list = RateBudget { limit: 50, window_secs: 60 };
    config
}

/// Application state over an in-memory database with scripted alignments
pub async fn studio_with(
    config: StudioConfig,
    alignments: &[(&str, i64, f64)],
    provider: Arc<dyn TranscriptionProvider>,
) -> AppState {
    let pool = ruach_studio::db::init_memory_pool()
        .await
        .expect("Failed to create in-memory database");

    let collaborators = Collaborators {
        aligner: Arc::new(ScriptedAligner::new(alignments)),
        audio: Arc::new(LetterAudio),
        provider,
        counters: Arc::new(InMemoryCounterStore::new()),
    };
    AppState::new(pool, EventBus::new(256), config, collaborators)
}

pub async fn studio(alignments: &[(&str, i64, f64)]) -> AppState {
    studio_with(test_config(), alignments, Arc::new(MockTranscriptionProvider::default())).await
}

/// Register every angle, then report uploads and transcodes
pub async fn ready_session(state: &AppState, angles: &[&str]) -> Uuid {
    let session = state
        .sessions
        .create_session("Sunday service")
        .await
        .expect("create session");

    for angle in angles {
        state
            .ingestion
            .register_asset(session.id, angle, &format!("{}.mov", angle))
            .await
            .expect("register asset");
    }
    for angle in angles {
        state
            .ingestion
            .report_upload_complete(session.id, angle, Some(format!("uploads/{}.mov", angle)))
            .await
            .expect("upload complete");
    }
    for angle in angles {
        report_transcoded(state, session.id, angle).await;
    }

    session.id
}

pub async fn report_transcoded(state: &AppState, session_id: Uuid, angle: &str) {
    state
        .ingestion
        .report_transcode_complete(
            session_id,
            angle,
            ANGLE_DURATION_MS,
            Renditions {
                proxy: Some(format!("proxy/{}.mp4", angle)),
                audio: Some(format!("audio/{}.wav", angle)),
                ..Renditions::default()
            },
        )
        .await
        .expect("transcode complete");
}

/// Ready, computed and approved
pub async fn synced_session(state: &AppState, angles: &[&str]) -> Uuid {
    let session_id = ready_session(state, angles).await;
    state.sync.compute(session_id, None).await.expect("sync compute");
    state
        .sync
        .approve(session_id, "editor@ruach", None)
        .await
        .expect("sync approve");
    session_id
}

/// Synced, transcribed and compiled into EDL version 1
pub async fn editing_session(state: &AppState, angles: &[&str]) -> Uuid {
    let session_id = synced_session(state, angles).await;
    state
        .transcripts
        .compute(session_id, None)
        .await
        .expect("transcript");
    state.edl.compile(session_id).await.expect("compile EDL");
    session_id
}

pub fn router(state: AppState) -> Router {
    build_router(state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("router call")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}
