//! ruach-studio library
//!
//! Recording-session orchestration engine: session lifecycle, asset ingestion,
//! multi-angle audio sync, transcripts, EDL compilation and render jobs,
//! served over HTTP with SSE progress events.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, StudioError, StudioResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ruach_common::events::EventBus;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::StudioConfig;
use crate::services::{
    provider_from_config, AudioAligner, AudioSource, CounterStore, CrossCorrelationAligner,
    EdlCompiler, InMemoryCounterStore, IngestionTracker, RateLimiter, RenderQueue, SessionMachine,
    SyncEngine, TranscriptGenerator, TranscriptionError, TranscriptionProvider, WavAudioSource,
};

/// Pluggable collaborators behind the engine's seams
#[derive(Clone)]
pub struct Collaborators {
    pub aligner: Arc<dyn AudioAligner>,
    pub audio: Arc<dyn AudioSource>,
    pub provider: Arc<dyn TranscriptionProvider>,
    pub counters: Arc<dyn CounterStore>,
}

impl Collaborators {
    /// Production wiring: WAV renditions under `media_root`, FFT alignment,
    /// the configured transcription provider and in-process rate counters
    pub fn from_config(config: &StudioConfig, media_root: &Path) -> Result<Self, TranscriptionError> {
        Ok(Self {
            aligner: Arc::new(CrossCorrelationAligner::new(
                config.sync.max_lag_ms,
                config.sync.min_overlap_ms,
            )),
            audio: Arc::new(WavAudioSource::new(media_root)),
            provider: provider_from_config(&config.transcription)?,
            counters: Arc::new(InMemoryCounterStore::new()),
        })
    }
}

/// Work the API hands off to a spawned task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundTask {
    Sync,
    Transcript,
}

impl fmt::Display for BackgroundTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundTask::Sync => f.write_str("sync"),
            BackgroundTask::Transcript => f.write_str("transcript"),
        }
    }
}

/// Most recent failure of one task for one session
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundFailure {
    pub task: BackgroundTask,
    pub session_id: Uuid,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub sessions: SessionMachine,
    pub ingestion: IngestionTracker,
    pub sync: SyncEngine,
    pub transcripts: TranscriptGenerator,
    pub edl: EdlCompiler,
    pub render: RenderQueue,
    pub rate_limiter: RateLimiter,
    pub config: Arc<StudioConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Outstanding background failures, reported by `/health`; a later
    /// successful run of the same task for the same session clears its entry
    pub background_failures: Arc<RwLock<HashMap<(BackgroundTask, Uuid), BackgroundFailure>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: StudioConfig,
        collaborators: Collaborators,
    ) -> Self {
        let sessions = SessionMachine::new(db.clone(), event_bus.clone());
        let rate_limiter = RateLimiter::new(collaborators.counters, config.rate_limits.clone());

        Self {
            ingestion: IngestionTracker::new(sessions.clone()),
            sync: SyncEngine::new(
                sessions.clone(),
                collaborators.aligner,
                collaborators.audio,
                config.sync.clone(),
            ),
            transcripts: TranscriptGenerator::new(
                sessions.clone(),
                collaborators.provider,
                config.transcription.clone(),
            ),
            edl: EdlCompiler::new(sessions.clone(), config.edl.clone()),
            render: RenderQueue::new(sessions.clone(), rate_limiter.clone()),
            rate_limiter,
            sessions,
            db,
            event_bus,
            config: Arc::new(config),
            startup_time: Utc::now(),
            background_failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Remember a background failure for the health endpoint
    pub async fn record_failure(
        &self,
        task: BackgroundTask,
        session_id: Uuid,
        message: impl Into<String>,
    ) {
        let failure = BackgroundFailure {
            task,
            session_id,
            message: message.into(),
            failed_at: Utc::now(),
        };
        self.background_failures
            .write()
            .await
            .insert((task, session_id), failure);
    }

    /// Forget the failure of `task` for `session_id` after a successful run
    pub async fn clear_failure(&self, task: BackgroundTask, session_id: Uuid) {
        if self
            .background_failures
            .write()
            .await
            .remove(&(task, session_id))
            .is_some()
        {
            tracing::info!(session_id = %session_id, task = %task, "Background task recovered");
        }
    }

    /// Outstanding failures, newest first
    pub async fn outstanding_failures(&self) -> Vec<BackgroundFailure> {
        let mut failures: Vec<BackgroundFailure> =
            self.background_failures.read().await.values().cloned().collect();
        failures.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        failures
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::session_routes())
        .merge(api::asset_routes())
        .merge(api::sync_routes())
        .merge(api::transcript_routes())
        .merge(api::edl_routes())
        .merge(api::render_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
