//! Edit decision lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdlStatus {
    Draft,
    Approved,
}

impl EdlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdlStatus::Draft => "draft",
            EdlStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for EdlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EdlStatus::Draft),
            "approved" => Ok(EdlStatus::Approved),
            other => Err(format!("unknown EDL status '{}'", other)),
        }
    }
}

/// One shot on the program track, in anchor-timeline milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub angle: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ProgramEntry {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub label: String,
    pub start_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleUsage {
    pub duration_ms: i64,
    /// Share of the total duration in [0, 1]
    pub fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdlMetrics {
    pub cut_count: usize,
    pub average_shot_ms: f64,
    pub angle_usage: BTreeMap<String, AngleUsage>,
}

/// Per-angle media captured at compile time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdlSource {
    pub asset_id: Uuid,
    pub offset_ms: i64,
    pub proxy: Option<String>,
    pub mezzanine: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdlAudit {
    /// Truncated SHA-256 over the transcript segments used
    pub transcript_hash: String,
    /// Truncated SHA-256 over the source assets and offsets
    pub assets_hash: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edl {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Monotonic per session, starting at 1
    pub version: i64,
    pub status: EdlStatus,
    pub strategy: String,
    pub duration_ms: i64,
    pub program: Vec<ProgramEntry>,
    pub chapters: Vec<Chapter>,
    pub metrics: EdlMetrics,
    pub sources: BTreeMap<String, EdlSource>,
    pub audit: EdlAudit,
    pub warnings: Vec<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edl {
    pub fn is_approved(&self) -> bool {
        self.status == EdlStatus::Approved
    }
}
