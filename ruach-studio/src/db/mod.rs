//! Database access for ruach-studio
//!
//! One repository module per entity. Nested structures (offset maps, segments,
//! tracks, approval metadata) are stored as JSON TEXT columns and decoded into
//! their typed models here; timestamps are RFC 3339 TEXT.

pub mod assets;
pub mod edls;
pub mod render_jobs;
pub mod sessions;
pub mod settings;
pub mod sync_results;
pub mod transcripts;

pub use assets::{list_assets, load_asset, save_asset};
pub use edls::{insert_edl, list_edls, load_edl, next_version, save_edl};
pub use render_jobs::{list_render_jobs, load_render_job, save_render_job};
pub use sessions::{list_sessions, load_session, save_session};
pub use settings::{load_sync_settings, save_sync_settings};
pub use sync_results::{load_sync_result, save_sync_result};
pub use transcripts::{fail_stale_transcripts, load_transcript, save_transcript};

use chrono::{DateTime, Utc};
use ruach_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Open (or create) the studio database in the root folder
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = ruach_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// In-memory database with every studio table (tests and dry runs)
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = ruach_common::db::init_memory_database().await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create studio tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            anchor_angle TEXT,
            offsets_ms TEXT NOT NULL DEFAULT '{}',
            confidence TEXT NOT NULL DEFAULT '{}',
            last_render_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            angle TEXT NOT NULL,
            filename TEXT NOT NULL,
            upload_status TEXT NOT NULL,
            transcode_status TEXT NOT NULL,
            duration_ms INTEGER,
            renditions TEXT NOT NULL DEFAULT '{}',
            failure_reason TEXT,
            excluded INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(session_id, angle)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_results (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id),
            anchor_angle TEXT NOT NULL,
            method TEXT NOT NULL,
            offsets_ms TEXT NOT NULL,
            confidence TEXT NOT NULL,
            classifications TEXT NOT NULL,
            alignment_errors TEXT NOT NULL DEFAULT '{}',
            computed_at TEXT NOT NULL,
            approval TEXT,
            approved_offsets_ms TEXT,
            corrections TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id),
            status TEXT NOT NULL,
            provider TEXT NOT NULL,
            provider_job_id TEXT,
            source_angle TEXT NOT NULL,
            offsets_ms TEXT NOT NULL,
            segments TEXT NOT NULL DEFAULT '[]',
            words TEXT NOT NULL DEFAULT '[]',
            full_text TEXT NOT NULL DEFAULT '',
            duration_ms INTEGER NOT NULL DEFAULT 0,
            has_diarization INTEGER NOT NULL DEFAULT 0,
            language TEXT,
            stats TEXT NOT NULL DEFAULT '{}',
            failure_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS edls (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            version INTEGER NOT NULL,
            status TEXT NOT NULL,
            strategy TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            program TEXT NOT NULL,
            chapters TEXT NOT NULL,
            metrics TEXT NOT NULL,
            sources TEXT NOT NULL,
            audit TEXT NOT NULL,
            warnings TEXT NOT NULL DEFAULT '[]',
            approved_by TEXT,
            approved_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(session_id, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS render_jobs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            edl_version INTEGER NOT NULL,
            status TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            progress REAL NOT NULL DEFAULT 0.0,
            failure_reason TEXT,
            artifacts TEXT,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_render_jobs_session ON render_jobs(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Internal(format!("Corrupt JSON in column '{}': {}", column, e)))
}

pub(crate) fn parse_uuid(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| Error::Internal(format!("Invalid UUID in column '{}': {}", column, e)))
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in column '{}': {}", column, e)))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(column, &s)).transpose()
}

pub(crate) fn parse_enum<T>(column: &str, raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| Error::Internal(format!("Invalid value in column '{}': {}", column, e)))
}
