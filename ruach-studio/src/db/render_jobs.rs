//! Render job persistence

use ruach_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_optional_timestamp, parse_timestamp, parse_uuid, to_json};
use crate::models::RenderJob;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

pub async fn save_render_job(pool: &SqlitePool, job: &RenderJob) -> Result<()> {
    let id = job.id.to_string();
    let session_id = job.session_id.to_string();
    let artifacts = job.artifacts.as_ref().map(to_json).transpose()?;
    let started_at = job.started_at.map(|t| t.to_rfc3339());
    let completed_at = job.completed_at.map(|t| t.to_rfc3339());
    let created_at = job.created_at.to_rfc3339();
    let updated_at = job.updated_at.to_rfc3339();

    retry_on_lock("save_render_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO render_jobs (
                id, user_id, session_id, edl_version, status, priority, progress,
                failure_reason, artifacts, started_at, completed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                failure_reason = excluded.failure_reason,
                artifacts = excluded.artifacts,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&job.user_id)
        .bind(&session_id)
        .bind(job.edl_version)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(job.progress)
        .bind(job.failure_reason.as_deref())
        .bind(artifacts.as_deref())
        .bind(started_at.as_deref())
        .bind(completed_at.as_deref())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_render_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<RenderJob>> {
    let row = sqlx::query("SELECT * FROM render_jobs WHERE id = ?")
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| render_job_from_row(&r)).transpose()
}

/// Jobs of a session, highest priority first, then oldest first
pub async fn list_render_jobs(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<RenderJob>> {
    let rows = sqlx::query(
        "SELECT * FROM render_jobs WHERE session_id = ? ORDER BY priority DESC, created_at, rowid",
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(render_job_from_row).collect()
}

fn render_job_from_row(row: &SqliteRow) -> Result<RenderJob> {
    let artifacts: Option<String> = row.get("artifacts");

    Ok(RenderJob {
        id: parse_uuid("id", row.get("id"))?,
        user_id: row.get("user_id"),
        session_id: parse_uuid("session_id", row.get("session_id"))?,
        edl_version: row.get("edl_version"),
        status: parse_enum("status", row.get("status"))?,
        priority: row.get("priority"),
        progress: row.get("progress"),
        failure_reason: row.get("failure_reason"),
        artifacts: artifacts
            .map(|raw| from_json("artifacts", &raw))
            .transpose()?,
        started_at: parse_optional_timestamp("started_at", row.get("started_at"))?,
        completed_at: parse_optional_timestamp("completed_at", row.get("completed_at"))?,
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
