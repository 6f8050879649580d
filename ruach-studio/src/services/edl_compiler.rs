//! EDL compilation
//!
//! Every compile produces a new version from the completed transcript and the
//! approved offsets. The program track must cover `[0, duration]` without gaps
//! or overlaps; anything else aborts the compile. Softer issues become warnings.

use chrono::Utc;
use ruach_common::events::StudioEvent;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EdlConfig;
use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{
    AngleUsage, Asset, Chapter, Edl, EdlAudit, EdlMetrics, EdlSource, EdlStatus, ProgramEntry,
    SessionStatus, Transcript,
};

use super::cut_strategy::{strategy_for, CutStrategyConfig, TimedSegment};
use super::SessionMachine;

const COMPILE_STATES: &[SessionStatus] = &[SessionStatus::Synced, SessionStatus::Editing];
const APPROVE_STATES: &[SessionStatus] = &[SessionStatus::Editing, SessionStatus::Rendering];

/// Words taken from a chapter's opening segment for its label
const CHAPTER_LABEL_WORDS: usize = 6;
const MAX_SWITCHES_PER_MINUTE: f64 = 15.0;

#[derive(Clone)]
pub struct EdlCompiler {
    sessions: SessionMachine,
    config: EdlConfig,
}

impl EdlCompiler {
    pub fn new(sessions: SessionMachine, config: EdlConfig) -> Self {
        Self { sessions, config }
    }

    pub async fn compile(&self, session_id: Uuid) -> StudioResult<Edl> {
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_status("EDL compilation", COMPILE_STATES)?;

        let sync = db::load_sync_result(self.sessions.db(), session_id)
            .await?
            .ok_or_else(|| {
                StudioError::Precondition(format!("session {} has no sync result", session_id))
            })?;
        let offsets = sync.usable_offsets().cloned().ok_or_else(|| {
            StudioError::Precondition(format!(
                "sync for session {} is not approved; EDL compilation needs a (re-)approved sync",
                session_id
            ))
        })?;

        let transcript = db::load_transcript(self.sessions.db(), session_id)
            .await?
            .filter(|t| t.is_completed())
            .ok_or_else(|| {
                StudioError::Precondition(format!(
                    "session {} has no completed transcript",
                    session_id
                ))
            })?;

        let assets: Vec<Asset> = db::list_assets(self.sessions.db(), session_id)
            .await?
            .into_iter()
            .filter(|a| a.is_participating() && offsets.contains_key(&a.angle))
            .collect();
        if assets.is_empty() {
            return Err(StudioError::Precondition(format!(
                "session {} has no synchronized angles",
                session_id
            )));
        }
        let angles: Vec<String> = assets.iter().map(|a| a.angle.clone()).collect();

        let duration_ms = transcript.duration_ms;
        let segments = anchor_segments(&transcript, &offsets, duration_ms);

        let strategy = strategy_for(&self.config.strategy, CutStrategyConfig::from(&self.config))?;
        let program = strategy.cut(&segments, &angles, duration_ms);
        validate_program(&program, duration_ms, &angles)?;

        let metrics = compute_metrics(&program, &angles, duration_ms);
        let warnings = self.collect_warnings(&program, &metrics, duration_ms);
        let chapters = self.chapters(&segments);

        let sources: BTreeMap<String, EdlSource> = assets
            .iter()
            .map(|a| {
                (
                    a.angle.clone(),
                    EdlSource {
                        asset_id: a.id,
                        offset_ms: offsets.get(&a.angle).copied().unwrap_or(0),
                        proxy: a.renditions.proxy.clone(),
                        mezzanine: a.renditions.mezzanine.clone(),
                    },
                )
            })
            .collect();

        let now = Utc::now();
        let audit = EdlAudit {
            transcript_hash: short_hash(&transcript.segments)?,
            assets_hash: short_hash(&sources)?,
            generated_at: now,
        };

        let edl = Edl {
            id: Uuid::new_v4(),
            session_id,
            version: db::next_version(self.sessions.db(), session_id).await?,
            status: EdlStatus::Draft,
            strategy: strategy.name().to_string(),
            duration_ms,
            program,
            chapters,
            metrics,
            sources,
            audit,
            warnings,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        db::insert_edl(self.sessions.db(), &edl).await?;

        for warning in &edl.warnings {
            warn!(session_id = %session_id, version = edl.version, "EDL warning: {}", warning);
        }
        info!(
            session_id = %session_id,
            version = edl.version,
            strategy = %edl.strategy,
            cuts = edl.metrics.cut_count,
            chapters = edl.chapters.len(),
            "EDL compiled"
        );

        if session.status == SessionStatus::Synced {
            self.sessions
                .advance(&mut session, SessionStatus::Editing)
                .await?;
        }

        self.sessions.event_bus().emit_lossy(StudioEvent::EdlCompiled {
            session_id,
            edl_id: edl.id,
            version: edl.version,
            cut_count: edl.metrics.cut_count,
            timestamp: now,
        });

        Ok(edl)
    }

    /// Mark one version approved; other versions are untouched
    pub async fn approve(&self, session_id: Uuid, version: i64, approved_by: &str) -> StudioResult<Edl> {
        let approved_by = approved_by.trim();
        if approved_by.is_empty() {
            return Err(StudioError::Validation("approved_by must not be empty".to_string()));
        }

        let _guard = self.sessions.locks().lock(session_id).await;
        let session = self.sessions.get_session(session_id).await?;
        session.ensure_status("EDL approval", APPROVE_STATES)?;

        let mut edl = self.load(session_id, version).await?;
        if edl.is_approved() {
            return Ok(edl);
        }

        let now = Utc::now();
        edl.status = EdlStatus::Approved;
        edl.approved_by = Some(approved_by.to_string());
        edl.approved_at = Some(now);
        edl.updated_at = now;
        db::save_edl(self.sessions.db(), &edl).await?;

        info!(session_id = %session_id, version, approved_by = %approved_by, "EDL approved");
        self.sessions.event_bus().emit_lossy(StudioEvent::EdlApproved {
            session_id,
            edl_id: edl.id,
            version,
            approved_by: approved_by.to_string(),
            timestamp: now,
        });

        Ok(edl)
    }

    pub async fn get_edl(&self, session_id: Uuid, version: i64) -> StudioResult<Edl> {
        self.sessions.get_session(session_id).await?;
        self.load(session_id, version).await
    }

    pub async fn list_edls(&self, session_id: Uuid) -> StudioResult<Vec<Edl>> {
        self.sessions.get_session(session_id).await?;
        Ok(db::list_edls(self.sessions.db(), session_id).await?)
    }

    async fn load(&self, session_id: Uuid, version: i64) -> StudioResult<Edl> {
        db::load_edl(self.sessions.db(), session_id, version)
            .await?
            .ok_or_else(|| {
                StudioError::NotFound(format!("EDL version {} of session {}", version, session_id))
            })
    }

    /// Chapter at 0, then at long pauses or when a chapter runs too long
    fn chapters(&self, segments: &[TimedSegment]) -> Vec<Chapter> {
        let mut chapters = Vec::new();
        let mut chapter_start = 0i64;
        let mut previous_end: Option<i64> = None;

        for segment in segments {
            let opens = match previous_end {
                None => true,
                Some(end) => {
                    segment.start_ms - end >= self.config.chapter_gap_ms
                        || segment.start_ms - chapter_start >= self.config.chapter_max_ms
                }
            };
            if opens {
                let start_ms = if chapters.is_empty() { 0 } else { segment.start_ms };
                chapters.push(Chapter {
                    label: chapter_label(&segment.text, chapters.len() + 1),
                    start_ms,
                });
                chapter_start = start_ms;
            }
            previous_end = Some(segment.end_ms);
        }

        if chapters.is_empty() {
            chapters.push(Chapter {
                label: chapter_label("", 1),
                start_ms: 0,
            });
        }
        chapters
    }

    fn collect_warnings(&self, program: &[ProgramEntry], metrics: &EdlMetrics, duration_ms: i64) -> Vec<String> {
        let mut warnings = Vec::new();
        let long_limit = self.config.max_shot_ms + self.config.max_shot_ms / 2;

        for (i, entry) in program.iter().enumerate() {
            let length = entry.duration_ms();
            if length < self.config.min_shot_ms {
                warnings.push(format!(
                    "Shot {} on {} is very short ({}ms < {}ms)",
                    i + 1,
                    entry.angle,
                    length,
                    self.config.min_shot_ms
                ));
            }
            if length > long_limit {
                warnings.push(format!(
                    "Shot {} on {} is very long ({}ms > {}ms)",
                    i + 1,
                    entry.angle,
                    length,
                    long_limit
                ));
            }
        }

        for (angle, usage) in &metrics.angle_usage {
            if usage.duration_ms == 0 {
                warnings.push(format!("Angle {} is never used", angle));
            }
        }

        if duration_ms > 0 {
            let per_minute = metrics.cut_count as f64 / (duration_ms as f64 / 60_000.0);
            if per_minute > MAX_SWITCHES_PER_MINUTE {
                warnings.push(format!(
                    "High frequency switching: {:.1} cuts per minute",
                    per_minute
                ));
            }
        }

        warnings
    }
}

/// Shift transcript segments from the source angle onto the anchor timeline
fn anchor_segments(
    transcript: &Transcript,
    offsets: &BTreeMap<String, i64>,
    duration_ms: i64,
) -> Vec<TimedSegment> {
    let source_offset = offsets.get(&transcript.source_angle).copied().unwrap_or(0);

    transcript
        .segments
        .iter()
        .filter_map(|s| {
            let start_ms = (s.start_ms - source_offset).max(0);
            let end_ms = (s.end_ms - source_offset).min(duration_ms);
            (end_ms > start_ms).then(|| TimedSegment {
                speaker: s.speaker.clone(),
                start_ms,
                end_ms,
                text: s.text.clone(),
            })
        })
        .collect()
}

/// Contiguous, non-overlapping, exactly spanning `[0, duration_ms]`, known angles only
pub fn validate_program(program: &[ProgramEntry], duration_ms: i64, angles: &[String]) -> StudioResult<()> {
    let fail = |detail: String| Err(StudioError::Validation(format!("EDL program track {}", detail)));

    let (Some(first), Some(last)) = (program.first(), program.last()) else {
        return fail("is empty".to_string());
    };
    if first.start_ms != 0 {
        return fail(format!("starts at {}ms, not 0", first.start_ms));
    }
    if last.end_ms != duration_ms {
        return fail(format!("ends at {}ms, expected {}ms", last.end_ms, duration_ms));
    }

    for (i, entry) in program.iter().enumerate() {
        if entry.end_ms <= entry.start_ms {
            return fail(format!("shot {} has non-positive length", i + 1));
        }
        if !angles.contains(&entry.angle) {
            return fail(format!("shot {} uses unknown angle '{}'", i + 1, entry.angle));
        }
        if let Some(next) = program.get(i + 1) {
            if next.start_ms != entry.end_ms {
                return fail(format!(
                    "has a gap or overlap between shots {} and {}",
                    i + 1,
                    i + 2
                ));
            }
        }
    }
    Ok(())
}

fn compute_metrics(program: &[ProgramEntry], angles: &[String], duration_ms: i64) -> EdlMetrics {
    let mut totals: BTreeMap<String, i64> = angles.iter().map(|a| (a.clone(), 0)).collect();
    for entry in program {
        *totals.entry(entry.angle.clone()).or_insert(0) += entry.duration_ms();
    }

    let angle_usage = totals
        .into_iter()
        .map(|(angle, total)| {
            let fraction = if duration_ms > 0 {
                total as f64 / duration_ms as f64
            } else {
                0.0
            };
            (angle, AngleUsage { duration_ms: total, fraction })
        })
        .collect();

    EdlMetrics {
        cut_count: program.len().saturating_sub(1),
        average_shot_ms: if program.is_empty() {
            0.0
        } else {
            duration_ms as f64 / program.len() as f64
        },
        angle_usage,
    }
}

fn chapter_label(text: &str, number: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().take(CHAPTER_LABEL_WORDS).collect();
    if words.is_empty() {
        format!("Chapter {}", number)
    } else {
        words.join(" ")
    }
}

/// First 16 hex digits of the SHA-256 of the value's JSON form
fn short_hash<T: Serialize>(value: &T) -> StudioResult<String> {
    let json = serde_json::to_vec(value)?;
    let digest = format!("{:x}", Sha256::digest(&json));
    Ok(digest[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(angle: &str, start_ms: i64, end_ms: i64) -> ProgramEntry {
        ProgramEntry {
            angle: angle.into(),
            start_ms,
            end_ms,
        }
    }

    fn ab() -> Vec<String> {
        vec!["A".into(), "B".into()]
    }

    #[test]
    fn contiguous_program_is_valid() {
        let program = vec![entry("A", 0, 5_000), entry("B", 5_000, 9_000)];
        assert!(validate_program(&program, 9_000, &ab()).is_ok());
    }

    #[test]
    fn gaps_overlaps_and_short_spans_are_fatal() {
        let gap = vec![entry("A", 0, 5_000), entry("B", 5_100, 9_000)];
        let overlap = vec![entry("A", 0, 5_000), entry("B", 4_900, 9_000)];
        let short = vec![entry("A", 0, 5_000)];
        let unknown = vec![entry("Z", 0, 9_000)];

        for program in [gap, overlap, short, unknown] {
            assert!(matches!(
                validate_program(&program, 9_000, &ab()),
                Err(StudioError::Validation(_))
            ));
        }
        assert!(validate_program(&[], 9_000, &ab()).is_err());
    }

    #[test]
    fn metrics_sum_to_duration() {
        let program = vec![entry("A", 0, 6_000), entry("B", 6_000, 8_000), entry("A", 8_000, 10_000)];
        let metrics = compute_metrics(&program, &["A".into(), "B".into(), "C".into()], 10_000);

        assert_eq!(metrics.cut_count, 2);
        assert_eq!(metrics.angle_usage["A"].duration_ms, 8_000);
        assert_eq!(metrics.angle_usage["C"].duration_ms, 0);
        let total: i64 = metrics.angle_usage.values().map(|u| u.duration_ms).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn chapter_labels_use_opening_words() {
        assert_eq!(
            chapter_label("Welcome everyone to the evening service tonight", 1),
            "Welcome everyone to the evening service"
        );
        assert_eq!(chapter_label("  ", 3), "Chapter 3");
    }

    #[test]
    fn hashes_are_short_and_stable() {
        let a = short_hash(&vec![1, 2, 3]).unwrap();
        assert_eq!(a.len(), 16);
        assert_eq!(a, short_hash(&vec![1, 2, 3]).unwrap());
        assert_ne!(a, short_hash(&vec![3, 2, 1]).unwrap());
    }
}
