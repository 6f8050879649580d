//! Sync computation over real WAV renditions

mod helpers;

use helpers::*;
use ruach_common::events::EventBus;
use ruach_studio::models::{Renditions, SyncClassification};
use ruach_studio::services::{
    CrossCorrelationAligner, InMemoryCounterStore, MockTranscriptionProvider, WavAudioSource,
};
use ruach_studio::{AppState, Collaborators, StudioError};
use std::path::Path;
use std::sync::Arc;

async fn wav_studio(media_root: &Path) -> AppState {
    let pool = ruach_studio::db::init_memory_pool().await.unwrap();
    let config = test_config();
    let collaborators = Collaborators {
        aligner: Arc::new(CrossCorrelationAligner::new(
            config.sync.max_lag_ms,
            config.sync.min_overlap_ms,
        )),
        audio: Arc::new(WavAudioSource::new(media_root)),
        provider: Arc::new(MockTranscriptionProvider::default()),
        counters: Arc::new(InMemoryCounterStore::new()),
    };
    AppState::new(pool, EventBus::new(64), config, collaborators)
}

/// Register every angle, then report each one transcoded with its WAV rendition
async fn register_all(state: &AppState, session_id: uuid::Uuid, angles: &[(&str, &str)]) {
    for (angle, _) in angles {
        state.ingestion.register_asset(session_id, angle, "cam.mov").await.unwrap();
    }
    for (angle, audio) in angles {
        state
            .ingestion
            .report_upload_complete(session_id, angle, None)
            .await
            .unwrap();
        state
            .ingestion
            .report_transcode_complete(
                session_id,
                angle,
                20_000,
                Renditions {
                    audio: Some(audio.to_string()),
                    ..Renditions::default()
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn late_starting_angle_gets_negative_offset() {
    let dir = tempfile::tempdir().unwrap();
    write_offset_pair(dir.path(), &NoiseConfig::default()).unwrap();

    let state = wav_studio(dir.path()).await;
    let session = state.sessions.create_session("Rehearsal").await.unwrap();
    register_all(&state, session.id, &[("A", "anchor.wav"), ("B", "late.wav")]).await;

    let result = state.sync.compute(session.id, None).await.unwrap();
    assert_eq!(result.method, "envelope-xcorr");
    assert_eq!(result.offsets_ms["A"], 0);
    assert!(
        (result.offsets_ms["B"] + 120).abs() <= 1,
        "offset was {}",
        result.offsets_ms["B"]
    );
    assert!(result.confidence["B"] > 0.8, "confidence was {}", result.confidence["B"]);
    assert_eq!(result.classifications["B"], SyncClassification::LooksGood);
}

#[tokio::test]
async fn anchor_choice_flips_the_sign() {
    let dir = tempfile::tempdir().unwrap();
    let config = NoiseConfig {
        late_start_ms: 300,
        seed: 42,
        ..NoiseConfig::default()
    };
    write_offset_pair(dir.path(), &config).unwrap();

    let state = wav_studio(dir.path()).await;
    let session = state.sessions.create_session("Rehearsal").await.unwrap();
    register_all(&state, session.id, &[("A", "anchor.wav"), ("B", "late.wav")]).await;

    let result = state.sync.compute(session.id, Some("B")).await.unwrap();
    assert_eq!(result.anchor_angle, "B");
    assert_eq!(result.offsets_ms["B"], 0);
    assert!((result.offsets_ms["A"] - 300).abs() <= 1, "offset was {}", result.offsets_ms["A"]);
}

#[tokio::test]
async fn cameras_at_different_sample_rates_share_a_time_base() {
    let dir = tempfile::tempdir().unwrap();
    write_mixed_rate_pair(dir.path(), &MixedRateConfig::default()).unwrap();

    let state = wav_studio(dir.path()).await;
    let session = state.sessions.create_session("Conference").await.unwrap();
    register_all(&state, session.id, &[("A", "anchor.wav"), ("B", "late.wav")]).await;

    let result = state.sync.compute(session.id, None).await.unwrap();
    assert!(
        (result.offsets_ms["B"] + 120).abs() <= 1,
        "offset was {}",
        result.offsets_ms["B"]
    );
    assert!(result.confidence["B"] > 0.8, "confidence was {}", result.confidence["B"]);
}

#[tokio::test]
async fn missing_anchor_audio_fails_without_touching_status() {
    let dir = tempfile::tempdir().unwrap();
    write_offset_pair(dir.path(), &NoiseConfig::default()).unwrap();

    let state = wav_studio(dir.path()).await;
    let session = state.sessions.create_session("Rehearsal").await.unwrap();
    register_all(&state, session.id, &[("A", "missing.wav"), ("B", "late.wav")]).await;

    let err = state.sync.compute(session.id, None).await.unwrap_err();
    assert!(matches!(err, StudioError::SyncComputationFailed(_)));
    assert_eq!(
        state.sessions.get_session(session.id).await.unwrap().status,
        ruach_studio::models::SessionStatus::NeedsReview
    );
}
