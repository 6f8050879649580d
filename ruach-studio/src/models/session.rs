//! Recording session lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{StudioError, StudioResult};

/// Session lifecycle status
///
/// Declaration order is the forward order of the main line; `Archived` is the
/// side branch reachable from every other status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Draft,
    Ingesting,
    NeedsReview,
    Syncing,
    Synced,
    Editing,
    Rendering,
    Published,
    Archived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Ingesting => "ingesting",
            SessionStatus::NeedsReview => "needs-review",
            SessionStatus::Syncing => "syncing",
            SessionStatus::Synced => "synced",
            SessionStatus::Editing => "editing",
            SessionStatus::Rendering => "rendering",
            SessionStatus::Published => "published",
            SessionStatus::Archived => "archived",
        }
    }

    /// Successor on the main line
    pub fn next(&self) -> Option<SessionStatus> {
        match self {
            SessionStatus::Draft => Some(SessionStatus::Ingesting),
            SessionStatus::Ingesting => Some(SessionStatus::NeedsReview),
            SessionStatus::NeedsReview => Some(SessionStatus::Syncing),
            SessionStatus::Syncing => Some(SessionStatus::Synced),
            SessionStatus::Synced => Some(SessionStatus::Editing),
            SessionStatus::Editing => Some(SessionStatus::Rendering),
            SessionStatus::Rendering => Some(SessionStatus::Published),
            SessionStatus::Published | SessionStatus::Archived => None,
        }
    }

    /// Only single forward steps and moves into `Archived` are legal
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        if *self == SessionStatus::Archived {
            return false;
        }
        target == SessionStatus::Archived || self.next() == Some(target)
    }

    pub fn is_archived(&self) -> bool {
        *self == SessionStatus::Archived
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SessionStatus::Draft),
            "ingesting" => Ok(SessionStatus::Ingesting),
            "needs-review" => Ok(SessionStatus::NeedsReview),
            "syncing" => Ok(SessionStatus::Syncing),
            "synced" => Ok(SessionStatus::Synced),
            "editing" => Ok(SessionStatus::Editing),
            "rendering" => Ok(SessionStatus::Rendering),
            "published" => Ok(SessionStatus::Published),
            "archived" => Ok(SessionStatus::Archived),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Record of one accepted status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_status: SessionStatus,
    pub new_status: SessionStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// A multi-camera recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub status: SessionStatus,
    /// Set when sync computation first runs
    pub anchor_angle: Option<String>,
    /// Working offsets (most recent compute or correction), angle → ms
    pub offsets_ms: BTreeMap<String, i64>,
    /// Confidence per angle in [0, 1]
    pub confidence: BTreeMap<String, f64>,
    /// Most recent render failure while the session stays in `rendering`
    pub last_render_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: SessionStatus::Draft,
            anchor_angle: None,
            offsets_ms: BTreeMap::new(),
            confidence: BTreeMap::new(),
            last_render_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, rejecting anything but a single forward step or archival
    pub fn transition_to(&mut self, target: SessionStatus) -> StudioResult<StateTransition> {
        if !self.status.can_transition_to(target) {
            return Err(StudioError::Precondition(format!(
                "session {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }

        let transition = StateTransition {
            session_id: self.id,
            old_status: self.status,
            new_status: target,
            transitioned_at: Utc::now(),
        };
        self.status = target;
        self.updated_at = transition.transitioned_at;

        Ok(transition)
    }

    /// Reject phase-triggering operations on archived sessions
    pub fn ensure_not_archived(&self) -> StudioResult<()> {
        if self.status.is_archived() {
            return Err(StudioError::Precondition(format!(
                "session {} is archived",
                self.id
            )));
        }
        Ok(())
    }

    /// Require one of `allowed` for the named operation
    pub fn ensure_status(&self, operation: &str, allowed: &[SessionStatus]) -> StudioResult<()> {
        self.ensure_not_archived()?;
        if !allowed.contains(&self.status) {
            let allowed: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
            return Err(StudioError::Precondition(format!(
                "{} requires session status {}; session {} is {}",
                operation,
                allowed.join(" or "),
                self.id,
                self.status
            )));
        }
        Ok(())
    }
}
