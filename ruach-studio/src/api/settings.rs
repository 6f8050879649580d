//! Runtime sync settings
//!
//! GET/PUT /settings/sync. Values written here are stored in the settings
//! table and take precedence over the TOML configuration.

use axum::{extract::State, routing::get, Json, Router};

use crate::{error::ApiResult, services::SyncSettings, AppState};

pub async fn get_sync_settings(State(state): State<AppState>) -> ApiResult<Json<SyncSettings>> {
    Ok(Json(state.sync.settings().await?))
}

pub async fn put_sync_settings(
    State(state): State<AppState>,
    Json(settings): Json<SyncSettings>,
) -> ApiResult<Json<SyncSettings>> {
    Ok(Json(state.sync.update_settings(settings).await?))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/settings/sync", get(get_sync_settings).put(put_sync_settings))
}
