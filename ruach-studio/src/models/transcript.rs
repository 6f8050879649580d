//! Session transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Processing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Processing => "processing",
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(TranscriptStatus::Processing),
            "completed" => Ok(TranscriptStatus::Completed),
            "failed" => Ok(TranscriptStatus::Failed),
            other => Err(format!("unknown transcript status '{}'", other)),
        }
    }
}

/// One speaking turn on the source angle's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Segment {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Derived quality figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptStats {
    pub speaker_count: usize,
    pub average_confidence: Option<f64>,
    pub low_confidence_segments: usize,
}

/// Segments below this confidence count as low-confidence
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

impl TranscriptStats {
    pub fn from_segments(segments: &[Segment]) -> Self {
        let speakers: BTreeSet<&str> = segments
            .iter()
            .filter_map(|s| s.speaker.as_deref())
            .collect();

        let confidences: Vec<f64> = segments.iter().filter_map(|s| s.confidence).collect();
        let average_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        Self {
            speaker_count: speakers.len(),
            average_confidence,
            low_confidence_segments: confidences
                .iter()
                .filter(|c| **c < LOW_CONFIDENCE_THRESHOLD)
                .count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "application/x-subrip; charset=utf-8",
            SubtitleFormat::Vtt => "text/vtt; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}

impl FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            other => Err(format!("unknown subtitle format '{}'", other)),
        }
    }
}

/// The single transcript of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub session_id: Uuid,
    pub status: TranscriptStatus,
    pub provider: String,
    pub provider_job_id: Option<String>,
    pub source_angle: String,
    /// Offsets active when the transcript was generated
    pub offsets_ms: BTreeMap<String, i64>,
    pub segments: Vec<Segment>,
    pub words: Vec<WordTiming>,
    pub full_text: String,
    pub duration_ms: i64,
    pub has_diarization: bool,
    pub language: Option<String>,
    pub stats: TranscriptStats,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// New record in `processing`, before the provider is called
    pub fn processing(
        session_id: Uuid,
        provider: impl Into<String>,
        source_angle: impl Into<String>,
        offsets_ms: BTreeMap<String, i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            status: TranscriptStatus::Processing,
            provider: provider.into(),
            provider_job_id: None,
            source_angle: source_angle.into(),
            offsets_ms,
            segments: Vec::new(),
            words: Vec::new(),
            full_text: String::new(),
            duration_ms: 0,
            has_diarization: false,
            language: None,
            stats: TranscriptStats::default(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TranscriptStatus::Completed
    }
}
