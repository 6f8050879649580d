//! SyncResult persistence (one row per session)

use ruach_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_timestamp, parse_uuid, to_json};
use crate::models::SyncResult;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Insert or replace the session's sync result
pub async fn save_sync_result(pool: &SqlitePool, result: &SyncResult) -> Result<()> {
    let id = result.id.to_string();
    let session_id = result.session_id.to_string();
    let offsets = to_json(&result.offsets_ms)?;
    let confidence = to_json(&result.confidence)?;
    let classifications = to_json(&result.classifications)?;
    let alignment_errors = to_json(&result.alignment_errors)?;
    let approval = result.approval.as_ref().map(to_json).transpose()?;
    let approved_offsets = result.approved_offsets_ms.as_ref().map(to_json).transpose()?;
    let corrections = to_json(&result.corrections)?;
    let computed_at = result.computed_at.to_rfc3339();
    let updated_at = result.updated_at.to_rfc3339();

    retry_on_lock("save_sync_result", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO sync_results (
                id, session_id, anchor_angle, method, offsets_ms, confidence,
                classifications, alignment_errors, computed_at, approval,
                approved_offsets_ms, corrections, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                id = excluded.id,
                anchor_angle = excluded.anchor_angle,
                method = excluded.method,
                offsets_ms = excluded.offsets_ms,
                confidence = excluded.confidence,
                classifications = excluded.classifications,
                alignment_errors = excluded.alignment_errors,
                computed_at = excluded.computed_at,
                approval = excluded.approval,
                approved_offsets_ms = excluded.approved_offsets_ms,
                corrections = excluded.corrections,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&session_id)
        .bind(&result.anchor_angle)
        .bind(&result.method)
        .bind(&offsets)
        .bind(&confidence)
        .bind(&classifications)
        .bind(&alignment_errors)
        .bind(&computed_at)
        .bind(approval.as_deref())
        .bind(approved_offsets.as_deref())
        .bind(&corrections)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_sync_result(pool: &SqlitePool, session_id: Uuid) -> Result<Option<SyncResult>> {
    let row = sqlx::query("SELECT * FROM sync_results WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| sync_result_from_row(&r)).transpose()
}

fn sync_result_from_row(row: &SqliteRow) -> Result<SyncResult> {
    let approval: Option<String> = row.get("approval");
    let approved_offsets: Option<String> = row.get("approved_offsets_ms");

    Ok(SyncResult {
        id: parse_uuid("id", row.get("id"))?,
        session_id: parse_uuid("session_id", row.get("session_id"))?,
        anchor_angle: row.get("anchor_angle"),
        method: row.get("method"),
        offsets_ms: from_json("offsets_ms", row.get("offsets_ms"))?,
        confidence: from_json("confidence", row.get("confidence"))?,
        classifications: from_json("classifications", row.get("classifications"))?,
        alignment_errors: from_json("alignment_errors", row.get("alignment_errors"))?,
        computed_at: parse_timestamp("computed_at", row.get("computed_at"))?,
        approval: approval
            .map(|raw| from_json("approval", &raw))
            .transpose()?,
        approved_offsets_ms: approved_offsets
            .map(|raw| from_json("approved_offsets_ms", &raw))
            .transpose()?,
        corrections: from_json("corrections", row.get("corrections"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
