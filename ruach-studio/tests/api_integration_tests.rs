//! HTTP API integration tests
//!
//! Drive the axum router with `oneshot` over an in-memory database.

mod helpers;

use axum::http::{header, StatusCode};
use helpers::*;
use ruach_studio::config::RateBudget;
use ruach_studio::services::MockTranscriptionProvider;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn health_reports_module_and_build() {
    let app = router(studio(&[]).await);

    let response = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "ruach-studio");
    assert!(json["git_hash"].is_string());
    assert!(json.get("last_error").is_none());
    assert!(json.get("failing_tasks").is_none());
}

#[tokio::test]
async fn session_and_asset_endpoints_walk_ingestion() {
    let app = router(studio(&[]).await);

    let response = send(&app, json_request("POST", "/sessions", json!({"title": "Sunday"}))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = body_json(response).await;
    assert_eq!(session["status"], "draft");
    let id = session["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/assets", id),
            json!({"angle": "A", "filename": "a.mov"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let asset = body_json(response).await;
    assert_eq!(asset["upload_status"], "pending");

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/assets", id),
            json!({"angle": "A", "filename": "again.mov"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["action"], "fix_input");

    let response = send(
        &app,
        empty_request("POST", &format!("/sessions/{}/assets/A/upload-complete", id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["transcode_status"], "processing");

    let response = send(&app, empty_request("GET", &format!("/sessions/{}/readiness", id))).await;
    assert_eq!(body_json(response).await["ready"], false);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/assets/A/transcode-complete", id),
            json!({"duration_ms": 60000, "renditions": {"proxy": "proxy/a.mp4", "audio": "audio/a.wav"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", &format!("/sessions/{}/readiness", id))).await;
    assert_eq!(body_json(response).await["ready"], true);

    let response = send(&app, empty_request("GET", &format!("/sessions/{}", id))).await;
    assert_eq!(body_json(response).await["status"], "needs-review");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let app = router(studio(&[]).await);

    let response = send(&app, empty_request("GET", &format!("/sessions/{}", Uuid::new_v4()))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn sync_compute_is_accepted_then_observable() {
    let state = studio(&[("B", -120, 0.86)]).await;
    let session_id = ready_session(&state, &["A", "B"]).await;
    let app = router(state);

    let response = send(
        &app,
        empty_request("POST", &format!("/sessions/{}/sync", session_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mut result = None;
    for _ in 0..50 {
        let response = send(&app, empty_request("GET", &format!("/sessions/{}/sync", session_id))).await;
        if response.status() == StatusCode::OK {
            result = Some(body_json(response).await);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let result = result.expect("sync result never appeared");
    assert_eq!(result["offsets_ms"]["B"], -120);
    assert_eq!(result["classifications"]["B"], "looks-good");

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/sync/approve", session_id),
            json!({"approved_by": "editor@ruach"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/sync/correct", session_id),
            json!({"offsets_ms": {"Z": 5}, "corrected_by": "editor@ruach"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

async fn wait_for_health(app: &axum::Router, status: &str) -> serde_json::Value {
    for _ in 0..50 {
        let json = body_json(send(app, empty_request("GET", "/health")).await).await;
        if json["status"] == status {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("health never became {}", status);
}

#[tokio::test]
async fn health_recovers_once_a_failed_sync_succeeds() {
    // Only B is scripted, so anchoring on B leaves A unalignable
    let state = studio(&[("B", -120, 0.86)]).await;
    let session_id = ready_session(&state, &["A", "B"]).await;
    let app = router(state);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/sync", session_id),
            json!({"anchor_angle": "B"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let degraded = wait_for_health(&app, "degraded").await;
    assert_eq!(degraded["failing_tasks"][0]["task"], "sync");
    assert_eq!(degraded["failing_tasks"][0]["session_id"], session_id.to_string());
    assert!(degraded["last_error"].as_str().unwrap().starts_with("sync "));

    let response = send(
        &app,
        empty_request("POST", &format!("/sessions/{}/sync", session_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let healthy = wait_for_health(&app, "ok").await;
    assert!(healthy.get("last_error").is_none());
    assert!(healthy.get("failing_tasks").is_none());
}

#[tokio::test]
async fn sync_compute_before_ingestion_is_a_conflict() {
    let state = studio(&[]).await;
    let session = state.sessions.create_session("Early").await.unwrap();
    let app = router(state);

    let response = send(
        &app,
        json_request("POST", &format!("/sessions/{}/sync", session.id), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "PRECONDITION_FAILED");
}

#[tokio::test]
async fn subtitles_are_served_with_format_headers() {
    let state = studio(&[("B", -120, 0.86)]).await;
    let session_id = synced_session(&state, &["A", "B"]).await;
    state.transcripts.compute(session_id, None).await.unwrap();
    let app = router(state);

    let response = send(
        &app,
        empty_request(
            "GET",
            &format!("/sessions/{}/subtitles/B?format=vtt&speakers=false", session_id),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/vtt; charset=utf-8");
    let body = body_text(response).await;
    assert!(body.starts_with("WEBVTT\n\n00:00:00.000 --> 00:00:04.380\n"));
    assert!(!body.contains("Speaker A:"));

    let response = send(
        &app,
        empty_request("GET", &format!("/sessions/{}/subtitles/Q", session_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transcript_compute_returns_processing_record() {
    let state = studio(&[("B", -120, 0.86)]).await;
    let session_id = synced_session(&state, &["A", "B"]).await;
    let app = router(state);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/transcript", session_id),
            json!({"source_angle": "B"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let transcript = body_json(response).await;
    assert_eq!(transcript["status"], "processing");
    assert_eq!(transcript["source_angle"], "B");
}

#[tokio::test]
async fn render_endpoints_require_user_header() {
    let state = studio(&[("B", -120, 0.86)]).await;
    let session_id = editing_session(&state, &["A", "B"]).await;
    let app = router(state);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/renders", session_id),
            json!({"edl_version": 1}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn render_flow_over_http_with_rate_limit() {
    let mut config = test_config();
    config.rate_limits.create = RateBudget { limit: 1, window_secs: 60 };
    let state = studio_with(
        config,
        &[("B", -120, 0.86)],
        Arc::new(MockTranscriptionProvider::default()),
    )
    .await;
    let session_id = editing_session(&state, &["A", "B"]).await;
    let app = router(state);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/sessions/{}/edls/1/approve", session_id),
            json!({"approved_by": "director@ruach"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "approved");

    let submit = || {
        let mut request = json_request(
            "POST",
            &format!("/sessions/{}/renders", session_id),
            json!({"edl_version": 1, "priority": 3}),
        );
        request
            .headers_mut()
            .insert("x-user-id", "alice".parse().unwrap());
        request
    };

    let response = send(&app, submit()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await;
    assert_eq!(job["status"], "queued");
    let job_id = job["id"].as_str().unwrap().to_string();

    let response = send(&app, submit()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(body_json(response).await["error"]["action"], "retry_later");

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/renders/{}/progress", job_id),
            json!({"status": "processing", "progress": 0.25}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut status = empty_request("GET", &format!("/renders/{}", job_id));
    status.headers_mut().insert("x-user-id", "alice".parse().unwrap());
    let response = send(&app, status).await;
    assert_eq!(body_json(response).await["status"], "processing");

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("/renders/{}/complete", job_id),
            json!({"video": ""}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn sync_settings_round_trip_through_the_database() {
    let app = router(studio(&[]).await);

    let response = send(&app, empty_request("GET", "/settings/sync")).await;
    let settings = body_json(response).await;
    assert_eq!(settings["review_threshold"], 0.5);
    assert_eq!(settings["auto_approve"], false);

    let response = send(
        &app,
        json_request(
            "PUT",
            "/settings/sync",
            json!({"review_threshold": 0.6, "looks_good_threshold": 0.9, "auto_approve": true}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", "/settings/sync")).await;
    let settings = body_json(response).await;
    assert_eq!(settings["looks_good_threshold"], 0.9);
    assert_eq!(settings["auto_approve"], true);

    let response = send(
        &app,
        json_request(
            "PUT",
            "/settings/sync",
            json!({"review_threshold": 0.95, "looks_good_threshold": 0.9, "auto_approve": false}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn event_stream_is_server_sent_events() {
    let app = router(studio(&[]).await);

    let response = send(
        &app,
        empty_request("GET", &format!("/events?session_id={}", Uuid::new_v4())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
}
