//! Asset persistence

use ruach_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_timestamp, parse_uuid, to_json};
use crate::models::Asset;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Insert or update an asset (keyed by id)
pub async fn save_asset(pool: &SqlitePool, asset: &Asset) -> Result<()> {
    let id = asset.id.to_string();
    let session_id = asset.session_id.to_string();
    let renditions = to_json(&asset.renditions)?;
    let created_at = asset.created_at.to_rfc3339();
    let updated_at = asset.updated_at.to_rfc3339();

    retry_on_lock("save_asset", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO assets (
                id, session_id, angle, filename, upload_status, transcode_status,
                duration_ms, renditions, failure_reason, excluded, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                upload_status = excluded.upload_status,
                transcode_status = excluded.transcode_status,
                duration_ms = excluded.duration_ms,
                renditions = excluded.renditions,
                failure_reason = excluded.failure_reason,
                excluded = excluded.excluded,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&session_id)
        .bind(&asset.angle)
        .bind(&asset.filename)
        .bind(asset.upload_status.as_str())
        .bind(asset.transcode_status.as_str())
        .bind(asset.duration_ms)
        .bind(&renditions)
        .bind(asset.failure_reason.as_deref())
        .bind(asset.excluded)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_asset(pool: &SqlitePool, session_id: Uuid, angle: &str) -> Result<Option<Asset>> {
    let row = sqlx::query("SELECT * FROM assets WHERE session_id = ? AND angle = ?")
        .bind(session_id.to_string())
        .bind(angle)
        .fetch_optional(pool)
        .await?;

    row.map(|r| asset_from_row(&r)).transpose()
}

/// Assets of a session in registration order
pub async fn list_assets(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<Asset>> {
    let rows = sqlx::query("SELECT * FROM assets WHERE session_id = ? ORDER BY created_at, rowid")
        .bind(session_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(asset_from_row).collect()
}

fn asset_from_row(row: &SqliteRow) -> Result<Asset> {
    Ok(Asset {
        id: parse_uuid("id", row.get("id"))?,
        session_id: parse_uuid("session_id", row.get("session_id"))?,
        angle: row.get("angle"),
        filename: row.get("filename"),
        upload_status: parse_enum("upload_status", row.get("upload_status"))?,
        transcode_status: parse_enum("transcode_status", row.get("transcode_status"))?,
        duration_ms: row.get("duration_ms"),
        renditions: from_json("renditions", row.get("renditions"))?,
        failure_reason: row.get("failure_reason"),
        excluded: row.get("excluded"),
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
