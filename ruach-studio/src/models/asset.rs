//! Camera assets (one per angle)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Complete => "complete",
            UploadStatus::Failed => "failed",
        }
    }
}

impl TranscodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeStatus::Pending => "pending",
            TranscodeStatus::Processing => "processing",
            TranscodeStatus::Complete => "complete",
            TranscodeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TranscodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "complete" => Ok(UploadStatus::Complete),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("unknown upload status '{}'", other)),
        }
    }
}

impl FromStr for TranscodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TranscodeStatus::Pending),
            "processing" => Ok(TranscodeStatus::Processing),
            "complete" => Ok(TranscodeStatus::Complete),
            "failed" => Ok(TranscodeStatus::Failed),
            other => Err(format!("unknown transcode status '{}'", other)),
        }
    }
}

/// Storage locations produced by upload and transcoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mezzanine: Option<String>,
    /// Extracted audio track used for alignment and transcription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// One camera angle's media within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Angle label ("A", "B", ...), unique within the session
    pub angle: String,
    pub filename: String,
    pub upload_status: UploadStatus,
    pub transcode_status: TranscodeStatus,
    pub duration_ms: Option<i64>,
    pub renditions: Renditions,
    pub failure_reason: Option<String>,
    /// Excluded assets take no part in readiness, sync or editing
    pub excluded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(session_id: Uuid, angle: impl Into<String>, filename: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            angle: angle.into(),
            filename: filename.into(),
            upload_status: UploadStatus::Pending,
            transcode_status: TranscodeStatus::Pending,
            duration_ms: None,
            renditions: Renditions::default(),
            failure_reason: None,
            excluded: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counts toward readiness and may serve as anchor or program angle
    pub fn is_participating(&self) -> bool {
        !self.excluded
    }

    pub fn is_ready(&self) -> bool {
        self.transcode_status == TranscodeStatus::Complete
    }
}
