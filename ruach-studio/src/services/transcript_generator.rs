//! Transcript generation and subtitle export
//!
//! A transcript is written as `processing` before the provider is called and
//! finalized afterwards, so a crash mid-call leaves a visible record that the
//! startup sweep marks failed.

use chrono::Utc;
use ruach_common::events::StudioEvent;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TranscriptionConfig;
use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{
    Segment, SessionStatus, SubtitleFormat, Transcript, TranscriptStats, TranscriptStatus,
    WordTiming,
};

use super::subtitle;
use super::{ProviderSegment, SessionMachine, TranscriptionProvider, TranscriptionRequest};

const TRANSCRIBE_STATES: &[SessionStatus] = &[SessionStatus::Synced, SessionStatus::Editing];

#[derive(Clone)]
pub struct TranscriptGenerator {
    sessions: SessionMachine,
    provider: Arc<dyn TranscriptionProvider>,
    config: TranscriptionConfig,
}

impl TranscriptGenerator {
    pub fn new(
        sessions: SessionMachine,
        provider: Arc<dyn TranscriptionProvider>,
        config: TranscriptionConfig,
    ) -> Self {
        Self {
            sessions,
            provider,
            config,
        }
    }

    /// Validate, then record a `processing` transcript with the active offsets
    pub async fn begin(&self, session_id: Uuid, source_angle: Option<&str>) -> StudioResult<Transcript> {
        let _guard = self.sessions.locks().lock(session_id).await;
        let session = self.sessions.get_session(session_id).await?;
        session.ensure_status("transcription", TRANSCRIBE_STATES)?;

        let sync = db::load_sync_result(self.sessions.db(), session_id)
            .await?
            .ok_or_else(|| {
                StudioError::Precondition(format!("session {} has no sync result", session_id))
            })?;
        let offsets = sync.usable_offsets().cloned().ok_or_else(|| {
            StudioError::Precondition(format!(
                "sync for session {} is not approved; transcription needs a (re-)approved sync",
                session_id
            ))
        })?;

        let source = source_angle.unwrap_or(&sync.anchor_angle);
        let asset = db::load_asset(self.sessions.db(), session_id, source)
            .await?
            .filter(|a| a.is_participating() && a.is_ready())
            .ok_or_else(|| {
                StudioError::Validation(format!(
                    "source angle '{}' is not a ready, participating angle",
                    source
                ))
            })?;
        if !offsets.contains_key(&asset.angle) {
            return Err(StudioError::Validation(format!(
                "source angle '{}' has no approved offset",
                source
            )));
        }

        if let Some(existing) = db::load_transcript(self.sessions.db(), session_id).await? {
            if existing.status == TranscriptStatus::Processing {
                return Err(StudioError::Precondition(format!(
                    "transcript {} is already processing",
                    existing.id
                )));
            }
        }

        let transcript = Transcript::processing(session_id, self.provider.name(), &asset.angle, offsets);
        db::save_transcript(self.sessions.db(), &transcript).await?;

        info!(
            session_id = %session_id,
            transcript_id = %transcript.id,
            source_angle = %transcript.source_angle,
            provider = %transcript.provider,
            "Transcription started"
        );
        Ok(transcript)
    }

    /// Call the provider and finalize a transcript created by [`begin`](Self::begin)
    pub async fn finish(&self, mut transcript: Transcript) -> StudioResult<Transcript> {
        let session_id = transcript.session_id;
        let asset = db::load_asset(self.sessions.db(), session_id, &transcript.source_angle)
            .await?
            .ok_or_else(|| {
                StudioError::NotFound(format!("angle '{}' in session {}", transcript.source_angle, session_id))
            })?;

        let request = TranscriptionRequest {
            session_id,
            angle: asset.angle.clone(),
            audio_location: asset.renditions.audio.clone(),
            duration_ms: asset.duration_ms,
            language: self.config.language.clone(),
            diarization: self.config.diarization,
        };

        let outcome = self.provider.transcribe(&request).await;

        let _guard = self.sessions.locks().lock(session_id).await;
        let now = Utc::now();
        transcript.updated_at = now;

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                let reason = e.to_string();
                warn!(session_id = %session_id, transcript_id = %transcript.id, reason = %reason, "Transcription failed");

                transcript.status = TranscriptStatus::Failed;
                transcript.failure_reason = Some(reason.clone());
                db::save_transcript(self.sessions.db(), &transcript).await?;

                self.sessions.event_bus().emit_lossy(StudioEvent::TranscriptFailed {
                    session_id,
                    transcript_id: transcript.id,
                    error: reason.clone(),
                    timestamp: now,
                });
                return Err(StudioError::TranscriptionFailed(reason));
            }
        };

        let (segments, words) = normalize_segments(output.segments);
        let last_end = segments.last().map(|s| s.end_ms).unwrap_or(0);

        transcript.provider_job_id = output.provider_job_id;
        transcript.language = output.language.or_else(|| self.config.language.clone());
        transcript.has_diarization = segments.iter().any(|s| s.speaker.is_some());
        transcript.full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        transcript.duration_ms = asset.duration_ms.unwrap_or(0).max(last_end);
        transcript.stats = TranscriptStats::from_segments(&segments);
        transcript.segments = segments;
        transcript.words = words;
        transcript.status = TranscriptStatus::Completed;
        transcript.failure_reason = None;
        db::save_transcript(self.sessions.db(), &transcript).await?;

        info!(
            session_id = %session_id,
            transcript_id = %transcript.id,
            segments = transcript.segments.len(),
            duration_ms = transcript.duration_ms,
            low_confidence = transcript.stats.low_confidence_segments,
            "Transcription completed"
        );

        self.sessions.event_bus().emit_lossy(StudioEvent::TranscriptCompleted {
            session_id,
            transcript_id: transcript.id,
            segment_count: transcript.segments.len(),
            duration_ms: transcript.duration_ms,
            timestamp: now,
        });

        Ok(transcript)
    }

    pub async fn compute(&self, session_id: Uuid, source_angle: Option<&str>) -> StudioResult<Transcript> {
        let transcript = self.begin(session_id, source_angle).await?;
        self.finish(transcript).await
    }

    pub async fn get_transcript(&self, session_id: Uuid) -> StudioResult<Transcript> {
        self.sessions.get_session(session_id).await?;
        db::load_transcript(self.sessions.db(), session_id)
            .await?
            .ok_or_else(|| StudioError::NotFound(format!("transcript for session {}", session_id)))
    }

    /// Render subtitles on `angle`'s timeline
    ///
    /// Every cue is shifted by `offset[angle] - offset[source]` from the
    /// transcript's stored offsets, with one exception at the head of the
    /// timeline: subtitle files cannot carry negative timestamps, so a cue
    /// whose shifted start falls before zero starts at zero instead, and a
    /// cue that ends at or before zero is dropped. Those cues are not shifted
    /// by exactly the angle's offset.
    pub async fn get_subtitle(
        &self,
        session_id: Uuid,
        angle: &str,
        format: SubtitleFormat,
        include_speakers: bool,
    ) -> StudioResult<String> {
        let transcript = self.get_transcript(session_id).await?;
        if !transcript.is_completed() {
            return Err(StudioError::Precondition(format!(
                "transcript {} is {}",
                transcript.id, transcript.status
            )));
        }

        if db::load_asset(self.sessions.db(), session_id, angle).await?.is_none() {
            return Err(StudioError::NotFound(format!(
                "angle '{}' in session {}",
                angle, session_id
            )));
        }
        let target_offset = *transcript.offsets_ms.get(angle).ok_or_else(|| {
            StudioError::NotFound(format!("no offset for angle '{}' in session {}", angle, session_id))
        })?;
        let source_offset = transcript
            .offsets_ms
            .get(&transcript.source_angle)
            .copied()
            .unwrap_or(0);

        let cues = subtitle::shift_segments(&transcript.segments, target_offset - source_offset);
        Ok(subtitle::render(&cues, format, include_speakers))
    }
}

/// Order segments, trim overlaps, drop empties and keep words inside their segment
pub fn normalize_segments(raw: Vec<ProviderSegment>) -> (Vec<Segment>, Vec<WordTiming>) {
    let mut raw: Vec<ProviderSegment> = raw
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect();
    raw.sort_by_key(|s| (s.start_ms, s.end_ms));

    let mut segments: Vec<Segment> = Vec::with_capacity(raw.len());
    let mut words = Vec::new();
    let mut previous_end = 0i64;

    for item in raw {
        let start_ms = item.start_ms.max(previous_end);
        let end_ms = item.end_ms;
        if end_ms <= start_ms {
            continue;
        }

        words.extend(item.words.into_iter().filter_map(|w| {
            let w_start = w.start_ms.max(start_ms);
            let w_end = w.end_ms.min(end_ms);
            (w_end > w_start).then(|| WordTiming {
                start_ms: w_start,
                end_ms: w_end,
                ..w
            })
        }));

        segments.push(Segment {
            id: Uuid::new_v4(),
            speaker: item.speaker,
            start_ms,
            end_ms,
            text: item.text.trim().to_string(),
            confidence: item.confidence,
        });
        previous_end = end_ms;
    }

    (segments, words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start_ms: i64, end_ms: i64, text: &str) -> ProviderSegment {
        ProviderSegment {
            speaker: Some("Speaker A".into()),
            start_ms,
            end_ms,
            text: text.into(),
            confidence: Some(0.9),
            words: Vec::new(),
        }
    }

    #[test]
    fn segments_are_ordered_and_non_overlapping() {
        let (segments, _) = normalize_segments(vec![
            raw(5_000, 8_000, "third"),
            raw(0, 3_000, "first"),
            raw(2_500, 5_500, "second"),
            raw(6_000, 7_000, "swallowed"),
            raw(9_000, 9_500, "   "),
        ]);

        let spans: Vec<(i64, i64)> = segments.iter().map(|s| (s.start_ms, s.end_ms)).collect();
        assert_eq!(spans, vec![(0, 3_000), (3_000, 5_500), (5_500, 8_000)]);
        assert!(segments.windows(2).all(|w| w[0].end_ms <= w[1].start_ms));
    }

    #[test]
    fn words_never_cross_segment_bounds() {
        let mut segment = raw(1_000, 2_000, "hello world");
        segment.words = vec![
            WordTiming { text: "early".into(), start_ms: 500, end_ms: 1_200, confidence: None },
            WordTiming { text: "late".into(), start_ms: 1_900, end_ms: 2_400, confidence: None },
            WordTiming { text: "outside".into(), start_ms: 2_100, end_ms: 2_300, confidence: None },
        ];

        let (_, words) = normalize_segments(vec![segment]);
        assert_eq!(words.len(), 2);
        assert_eq!((words[0].start_ms, words[0].end_ms), (1_000, 1_200));
        assert_eq!((words[1].start_ms, words[1].end_ms), (1_900, 2_000));
    }
}
