//! Session persistence

use ruach_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_timestamp, parse_uuid, to_json};
use crate::models::Session;
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Insert or update a session
pub async fn save_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    let id = session.id.to_string();
    let status = session.status.as_str();
    let offsets = to_json(&session.offsets_ms)?;
    let confidence = to_json(&session.confidence)?;
    let created_at = session.created_at.to_rfc3339();
    let updated_at = session.updated_at.to_rfc3339();

    retry_on_lock("save_session", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, title, status, anchor_angle, offsets_ms, confidence,
                last_render_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                status = excluded.status,
                anchor_angle = excluded.anchor_angle,
                offsets_ms = excluded.offsets_ms,
                confidence = excluded.confidence,
                last_render_error = excluded.last_render_error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&session.title)
        .bind(status)
        .bind(session.anchor_angle.as_deref())
        .bind(&offsets)
        .bind(&confidence)
        .bind(session.last_render_error.as_deref())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| session_from_row(&r)).transpose()
}

/// All sessions, newest first
pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<Session>> {
    let rows = sqlx::query("SELECT * FROM sessions ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(session_from_row).collect()
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    Ok(Session {
        id: parse_uuid("id", row.get("id"))?,
        title: row.get("title"),
        status: parse_enum("status", row.get("status"))?,
        anchor_angle: row.get("anchor_angle"),
        offsets_ms: from_json("offsets_ms", row.get("offsets_ms"))?,
        confidence: from_json("confidence", row.get("confidence"))?,
        last_render_error: row.get("last_render_error"),
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::SessionStatus;

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let mut session = Session::new("Sunday service");
        session.status = SessionStatus::Syncing;
        session.anchor_angle = Some("A".into());
        session.offsets_ms.insert("B".into(), -120);
        session.confidence.insert("B".into(), 0.86);

        save_session(&pool, &session).await.unwrap();
        let loaded = load_session(&pool, session.id).await.unwrap().unwrap();

        assert_eq!(loaded.status, SessionStatus::Syncing);
        assert_eq!(loaded.anchor_angle.as_deref(), Some("A"));
        assert_eq!(loaded.offsets_ms["B"], -120);
        assert_eq!(loaded.confidence["B"], 0.86);
    }

    #[tokio::test]
    async fn save_updates_existing_row() {
        let pool = init_memory_pool().await.unwrap();
        let mut session = Session::new("Midweek");
        save_session(&pool, &session).await.unwrap();

        session.status = SessionStatus::Ingesting;
        save_session(&pool, &session).await.unwrap();

        let all = list_sessions(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, SessionStatus::Ingesting);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let pool = init_memory_pool().await.unwrap();
        assert!(load_session(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }
}
