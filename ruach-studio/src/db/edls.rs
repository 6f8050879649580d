//! EDL persistence (versioned per session)

use ruach_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_optional_timestamp, parse_timestamp, parse_uuid, to_json};
use crate::models::Edl;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Next version number for a session (1 for the first EDL)
pub async fn next_version(pool: &SqlitePool, session_id: Uuid) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM edls WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(max.unwrap_or(0) + 1)
}

/// Insert a new EDL version; an existing (session, version) pair is rejected
pub async fn insert_edl(pool: &SqlitePool, edl: &Edl) -> Result<()> {
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM edls WHERE session_id = ? AND version = ?")
            .bind(edl.session_id.to_string())
            .bind(edl.version)
            .fetch_one(pool)
            .await?;
    if existing > 0 {
        return Err(Error::InvalidInput(format!(
            "EDL version {} already exists for session {}",
            edl.version, edl.session_id
        )));
    }

    save_edl(pool, edl).await
}

/// Insert or update an EDL (keyed by id)
pub async fn save_edl(pool: &SqlitePool, edl: &Edl) -> Result<()> {
    let id = edl.id.to_string();
    let session_id = edl.session_id.to_string();
    let program = to_json(&edl.program)?;
    let chapters = to_json(&edl.chapters)?;
    let metrics = to_json(&edl.metrics)?;
    let sources = to_json(&edl.sources)?;
    let audit = to_json(&edl.audit)?;
    let warnings = to_json(&edl.warnings)?;
    let approved_at = edl.approved_at.map(|t| t.to_rfc3339());
    let created_at = edl.created_at.to_rfc3339();
    let updated_at = edl.updated_at.to_rfc3339();

    retry_on_lock("save_edl", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO edls (
                id, session_id, version, status, strategy, duration_ms, program,
                chapters, metrics, sources, audit, warnings, approved_by, approved_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                approved_by = excluded.approved_by,
                approved_at = excluded.approved_at,
                warnings = excluded.warnings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&session_id)
        .bind(edl.version)
        .bind(edl.status.as_str())
        .bind(&edl.strategy)
        .bind(edl.duration_ms)
        .bind(&program)
        .bind(&chapters)
        .bind(&metrics)
        .bind(&sources)
        .bind(&audit)
        .bind(&warnings)
        .bind(edl.approved_by.as_deref())
        .bind(approved_at.as_deref())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_edl(pool: &SqlitePool, session_id: Uuid, version: i64) -> Result<Option<Edl>> {
    let row = sqlx::query("SELECT * FROM edls WHERE session_id = ? AND version = ?")
        .bind(session_id.to_string())
        .bind(version)
        .fetch_optional(pool)
        .await?;

    row.map(|r| edl_from_row(&r)).transpose()
}

/// All versions of a session, oldest first
pub async fn list_edls(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<Edl>> {
    let rows = sqlx::query("SELECT * FROM edls WHERE session_id = ? ORDER BY version")
        .bind(session_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(edl_from_row).collect()
}

fn edl_from_row(row: &SqliteRow) -> Result<Edl> {
    Ok(Edl {
        id: parse_uuid("id", row.get("id"))?,
        session_id: parse_uuid("session_id", row.get("session_id"))?,
        version: row.get("version"),
        status: parse_enum("status", row.get("status"))?,
        strategy: row.get("strategy"),
        duration_ms: row.get("duration_ms"),
        program: from_json("program", row.get("program"))?,
        chapters: from_json("chapters", row.get("chapters"))?,
        metrics: from_json("metrics", row.get("metrics"))?,
        sources: from_json("sources", row.get("sources"))?,
        audit: from_json("audit", row.get("audit"))?,
        warnings: from_json("warnings", row.get("warnings"))?,
        approved_by: row.get("approved_by"),
        approved_at: parse_optional_timestamp("approved_at", row.get("approved_at"))?,
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
