//! Synchronization results, approval and correction history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Operator guidance derived from an angle's confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncClassification {
    LooksGood,
    ReviewSuggested,
    NeedsManualNudge,
}

/// Confidence cut-offs for classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncThresholds {
    /// Below this an angle needs a manual nudge
    pub review_threshold: f64,
    /// At or above this an angle looks good
    pub looks_good_threshold: f64,
}

impl Default for SyncThresholds {
    fn default() -> Self {
        Self {
            review_threshold: 0.5,
            looks_good_threshold: 0.8,
        }
    }
}

impl SyncThresholds {
    pub fn classify(&self, confidence: f64) -> SyncClassification {
        if confidence >= self.looks_good_threshold {
            SyncClassification::LooksGood
        } else if confidence >= self.review_threshold {
            SyncClassification::ReviewSuggested
        } else {
            SyncClassification::NeedsManualNudge
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.review_threshold) || !in_range(self.looks_good_threshold) {
            return Err("thresholds must lie in [0, 1]".to_string());
        }
        if self.review_threshold > self.looks_good_threshold {
            return Err("review_threshold must not exceed looks_good_threshold".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// One manual offset correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub offsets_ms: BTreeMap<String, i64>,
    pub corrected_by: String,
    pub notes: Option<String>,
    pub corrected_at: DateTime<Utc>,
}

/// What `approve` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Result was unapproved and is now approved
    Approved,
    /// Same approver, nothing changed
    AlreadyApproved,
    /// Already approved; approval metadata replaced by a different approver
    ApproverReplaced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub anchor_angle: String,
    /// Alignment primitive that produced the offsets
    pub method: String,
    /// Working offsets relative to the anchor (ms)
    pub offsets_ms: BTreeMap<String, i64>,
    pub confidence: BTreeMap<String, f64>,
    pub classifications: BTreeMap<String, SyncClassification>,
    /// Angles whose alignment failed, with the reason
    pub alignment_errors: BTreeMap<String, String>,
    pub computed_at: DateTime<Utc>,
    /// Latest approval; cleared by a correction
    pub approval: Option<Approval>,
    /// Offsets frozen by the most recent approval
    pub approved_offsets_ms: Option<BTreeMap<String, i64>>,
    pub corrections: Vec<Correction>,
    pub updated_at: DateTime<Utc>,
}

impl SyncResult {
    pub fn is_approved(&self) -> bool {
        self.approval.is_some()
    }

    /// Snapshot frozen by the latest approval; survives a correction
    pub fn active_offsets(&self) -> Option<&BTreeMap<String, i64>> {
        self.approved_offsets_ms.as_ref()
    }

    /// Offsets a new transcript or EDL may consume; `None` until approved
    /// again after a correction
    pub fn usable_offsets(&self) -> Option<&BTreeMap<String, i64>> {
        if self.is_approved() {
            self.active_offsets()
        } else {
            None
        }
    }

    pub fn all_at_least(&self, threshold: f64) -> bool {
        self.confidence.values().all(|c| *c >= threshold)
    }

    pub fn approve(&mut self, approved_by: &str, notes: Option<String>) -> ApprovalOutcome {
        let now = Utc::now();
        let outcome = match &self.approval {
            Some(existing) if existing.approved_by == approved_by => {
                return ApprovalOutcome::AlreadyApproved;
            }
            Some(_) => ApprovalOutcome::ApproverReplaced,
            None => {
                self.approved_offsets_ms = Some(self.offsets_ms.clone());
                ApprovalOutcome::Approved
            }
        };

        self.approval = Some(Approval {
            approved_by: approved_by.to_string(),
            approved_at: now,
            notes,
        });
        self.updated_at = now;
        outcome
    }

    /// Overwrite working offsets for the given angles and clear approval.
    /// The previously approved snapshot stays active until the next approval.
    pub fn apply_correction(&mut self, correction: Correction) {
        for (angle, offset) in &correction.offsets_ms {
            self.offsets_ms.insert(angle.clone(), *offset);
        }
        self.updated_at = correction.corrected_at;
        self.corrections.push(correction);
        self.approval = None;
    }
}
