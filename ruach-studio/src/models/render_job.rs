//! Render jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderJobStatus {
    Queued,
    Processing,
    Rendering,
    Completed,
    Failed,
    Cancelled,
}

impl RenderJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderJobStatus::Queued => "queued",
            RenderJobStatus::Processing => "processing",
            RenderJobStatus::Rendering => "rendering",
            RenderJobStatus::Completed => "completed",
            RenderJobStatus::Failed => "failed",
            RenderJobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderJobStatus::Completed | RenderJobStatus::Failed | RenderJobStatus::Cancelled
        )
    }

    /// Cancellation window
    pub fn is_cancellable(&self) -> bool {
        matches!(self, RenderJobStatus::Queued | RenderJobStatus::Processing)
    }

    /// Job transition table
    pub fn can_transition_to(&self, target: RenderJobStatus) -> bool {
        use RenderJobStatus::*;
        matches!(
            (self, target),
            (Queued, Processing)
                | (Processing, Rendering)
                | (Rendering, Completed)
                | (Queued | Processing | Rendering, Failed)
                | (Queued | Processing, Cancelled)
        )
    }
}

impl fmt::Display for RenderJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RenderJobStatus::Queued),
            "processing" => Ok(RenderJobStatus::Processing),
            "rendering" => Ok(RenderJobStatus::Rendering),
            "completed" => Ok(RenderJobStatus::Completed),
            "failed" => Ok(RenderJobStatus::Failed),
            "cancelled" => Ok(RenderJobStatus::Cancelled),
            other => Err(format!("unknown render job status '{}'", other)),
        }
    }
}

/// Output reported by the render worker on completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderArtifacts {
    pub video: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: Uuid,
    pub user_id: String,
    pub session_id: Uuid,
    pub edl_version: i64,
    pub status: RenderJobStatus,
    pub priority: i32,
    /// 0.0 to 1.0
    pub progress: f64,
    pub failure_reason: Option<String>,
    pub artifacts: Option<RenderArtifacts>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn queued(user_id: impl Into<String>, session_id: Uuid, edl_version: i64, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            session_id,
            edl_version,
            status: RenderJobStatus::Queued,
            priority,
            progress: 0.0,
            failure_reason: None,
            artifacts: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RenderJobStatus::*;

    #[test]
    fn cancellation_only_while_queued_or_processing() {
        for status in [Queued, Processing] {
            assert!(status.is_cancellable());
            assert!(status.can_transition_to(Cancelled));
        }
        for status in [Rendering, Completed, Failed, Cancelled] {
            assert!(!status.is_cancellable());
            assert!(!status.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Completed, Failed, Cancelled] {
            for to in [Queued, Processing, Rendering, Completed, Failed, Cancelled] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn completion_requires_rendering() {
        assert!(!Queued.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Completed));
        assert!(Rendering.can_transition_to(Completed));
    }
}
