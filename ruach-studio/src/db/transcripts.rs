//! Transcript persistence (one row per session)

use chrono::Utc;
use ruach_common::Result;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{from_json, parse_enum, parse_timestamp, parse_uuid, to_json};
use crate::models::{Transcript, TranscriptStatus};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Insert or replace the session's transcript
pub async fn save_transcript(pool: &SqlitePool, transcript: &Transcript) -> Result<()> {
    let id = transcript.id.to_string();
    let session_id = transcript.session_id.to_string();
    let offsets = to_json(&transcript.offsets_ms)?;
    let segments = to_json(&transcript.segments)?;
    let words = to_json(&transcript.words)?;
    let stats = to_json(&transcript.stats)?;
    let created_at = transcript.created_at.to_rfc3339();
    let updated_at = transcript.updated_at.to_rfc3339();

    retry_on_lock("save_transcript", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO transcripts (
                id, session_id, status, provider, provider_job_id, source_angle,
                offsets_ms, segments, words, full_text, duration_ms, has_diarization,
                language, stats, failure_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                id = excluded.id,
                status = excluded.status,
                provider = excluded.provider,
                provider_job_id = excluded.provider_job_id,
                source_angle = excluded.source_angle,
                offsets_ms = excluded.offsets_ms,
                segments = excluded.segments,
                words = excluded.words,
                full_text = excluded.full_text,
                duration_ms = excluded.duration_ms,
                has_diarization = excluded.has_diarization,
                language = excluded.language,
                stats = excluded.stats,
                failure_reason = excluded.failure_reason,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&session_id)
        .bind(transcript.status.as_str())
        .bind(&transcript.provider)
        .bind(transcript.provider_job_id.as_deref())
        .bind(&transcript.source_angle)
        .bind(&offsets)
        .bind(&segments)
        .bind(&words)
        .bind(&transcript.full_text)
        .bind(transcript.duration_ms)
        .bind(transcript.has_diarization)
        .bind(transcript.language.as_deref())
        .bind(&stats)
        .bind(transcript.failure_reason.as_deref())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn load_transcript(pool: &SqlitePool, session_id: Uuid) -> Result<Option<Transcript>> {
    let row = sqlx::query("SELECT * FROM transcripts WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| transcript_from_row(&r)).transpose()
}

/// Mark transcripts left in `processing` by a previous process as failed
///
/// Returns the number of rows updated.
pub async fn fail_stale_transcripts(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transcripts
        SET status = ?, failure_reason = ?, updated_at = ?
        WHERE status = ?
        "#,
    )
    .bind(TranscriptStatus::Failed.as_str())
    .bind("interrupted by service restart")
    .bind(Utc::now().to_rfc3339())
    .bind(TranscriptStatus::Processing.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn transcript_from_row(row: &SqliteRow) -> Result<Transcript> {
    Ok(Transcript {
        id: parse_uuid("id", row.get("id"))?,
        session_id: parse_uuid("session_id", row.get("session_id"))?,
        status: parse_enum("status", row.get("status"))?,
        provider: row.get("provider"),
        provider_job_id: row.get("provider_job_id"),
        source_angle: row.get("source_angle"),
        offsets_ms: from_json("offsets_ms", row.get("offsets_ms"))?,
        segments: from_json("segments", row.get("segments"))?,
        words: from_json("words", row.get("words"))?,
        full_text: row.get("full_text"),
        duration_ms: row.get("duration_ms"),
        has_diarization: row.get("has_diarization"),
        language: row.get("language"),
        stats: from_json("stats", row.get("stats"))?,
        failure_reason: row.get("failure_reason"),
        created_at: parse_timestamp("created_at", row.get("created_at"))?,
        updated_at: parse_timestamp("updated_at", row.get("updated_at"))?,
    })
}
