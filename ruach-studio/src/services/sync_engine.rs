//! Synchronization engine
//!
//! Computes per-angle offsets against an anchor, then gates downstream
//! phases on operator approval. `compute`, `approve` and `correct` hold the
//! session lock for their whole duration.

use chrono::Utc;
use ruach_common::events::StudioEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{
    ApprovalOutcome, Asset, Correction, Session, SessionStatus, SyncClassification, SyncResult,
    SyncThresholds,
};

use super::ingestion::all_assets_ready;
use super::{Alignment, AudioAligner, AudioSource, AudioTrack, SessionMachine};

/// Approver recorded when a result is approved without an operator
pub const AUTO_APPROVER: &str = "system:auto-sync";

const COMPUTE_STATES: &[SessionStatus] = &[SessionStatus::NeedsReview, SessionStatus::Syncing];
const REVIEW_STATES: &[SessionStatus] = &[SessionStatus::Syncing, SessionStatus::Synced];

/// Operator-adjustable sync settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub review_threshold: f64,
    pub looks_good_threshold: f64,
    pub auto_approve: bool,
}

impl SyncSettings {
    pub fn thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            review_threshold: self.review_threshold,
            looks_good_threshold: self.looks_good_threshold,
        }
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    sessions: SessionMachine,
    aligner: Arc<dyn AudioAligner>,
    audio: Arc<dyn AudioSource>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        sessions: SessionMachine,
        aligner: Arc<dyn AudioAligner>,
        audio: Arc<dyn AudioSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            sessions,
            aligner,
            audio,
            config,
        }
    }

    /// Current thresholds; database values override configuration
    pub async fn settings(&self) -> StudioResult<SyncSettings> {
        let (thresholds, auto_approve) = db::load_sync_settings(
            self.sessions.db(),
            self.config.thresholds(),
            self.config.auto_approve,
        )
        .await?;

        Ok(SyncSettings {
            review_threshold: thresholds.review_threshold,
            looks_good_threshold: thresholds.looks_good_threshold,
            auto_approve,
        })
    }

    pub async fn update_settings(&self, settings: SyncSettings) -> StudioResult<SyncSettings> {
        settings
            .thresholds()
            .validate()
            .map_err(StudioError::Validation)?;

        db::save_sync_settings(self.sessions.db(), settings.thresholds(), settings.auto_approve)
            .await?;

        info!(
            review_threshold = settings.review_threshold,
            looks_good_threshold = settings.looks_good_threshold,
            auto_approve = settings.auto_approve,
            "Sync settings updated"
        );
        Ok(settings)
    }

    /// Validate compute preconditions without running alignment
    pub async fn check_compute(&self, session_id: Uuid, anchor: Option<&str>) -> StudioResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        let assets = db::list_assets(self.sessions.db(), session_id).await?;
        plan_alignment(&session, &assets, anchor)?;
        Ok(())
    }

    /// Align every participating angle against the anchor and store the result
    ///
    /// On failure the session status is left untouched.
    pub async fn compute(&self, session_id: Uuid, anchor: Option<&str>) -> StudioResult<SyncResult> {
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        let assets = db::list_assets(self.sessions.db(), session_id).await?;
        let (anchor_asset, others) = plan_alignment(&session, &assets, anchor)?;

        let settings = self.settings().await?;
        let thresholds = settings.thresholds();

        info!(
            session_id = %session_id,
            anchor = %anchor_asset.angle,
            angles = others.len() + 1,
            method = %self.aligner.method(),
            "Computing sync"
        );

        let anchor_track = match self.audio.load(&anchor_asset).await {
            Ok(track) => Arc::new(track),
            Err(e) => {
                return Err(self.fail(session_id, format!("anchor '{}': {}", anchor_asset.angle, e)));
            }
        };

        let mut offsets_ms = BTreeMap::from([(anchor_asset.angle.clone(), 0)]);
        let mut confidence = BTreeMap::from([(anchor_asset.angle.clone(), 1.0)]);
        let mut alignment_errors = BTreeMap::new();

        for asset in &others {
            match self.align_one(anchor_track.clone(), asset).await {
                Ok(alignment) => {
                    debug!(
                        session_id = %session_id,
                        angle = %asset.angle,
                        offset_ms = alignment.offset_ms,
                        confidence = alignment.confidence,
                        "Angle aligned"
                    );
                    offsets_ms.insert(asset.angle.clone(), alignment.offset_ms);
                    confidence.insert(asset.angle.clone(), alignment.confidence);
                }
                Err(reason) => {
                    warn!(session_id = %session_id, angle = %asset.angle, reason = %reason, "Angle alignment failed");
                    offsets_ms.insert(asset.angle.clone(), 0);
                    confidence.insert(asset.angle.clone(), 0.0);
                    alignment_errors.insert(asset.angle.clone(), reason);
                }
            }
        }

        if !others.is_empty() && alignment_errors.len() == others.len() {
            let detail: Vec<String> = alignment_errors
                .iter()
                .map(|(angle, reason)| format!("{}: {}", angle, reason))
                .collect();
            return Err(self.fail(session_id, detail.join("; ")));
        }

        let classifications: BTreeMap<String, SyncClassification> = confidence
            .iter()
            .map(|(angle, c)| (angle.clone(), thresholds.classify(*c)))
            .collect();

        let now = Utc::now();
        let mut result = SyncResult {
            id: Uuid::new_v4(),
            session_id,
            anchor_angle: anchor_asset.angle.clone(),
            method: self.aligner.method().to_string(),
            offsets_ms,
            confidence,
            classifications,
            alignment_errors,
            computed_at: now,
            approval: None,
            approved_offsets_ms: None,
            corrections: Vec::new(),
            updated_at: now,
        };
        db::save_sync_result(self.sessions.db(), &result).await?;

        session.anchor_angle = Some(result.anchor_angle.clone());
        session.offsets_ms = result.offsets_ms.clone();
        session.confidence = result.confidence.clone();
        if session.status == SessionStatus::NeedsReview {
            self.sessions
                .advance(&mut session, SessionStatus::Syncing)
                .await?;
        } else {
            self.sessions.save(&mut session).await?;
        }

        self.sessions.event_bus().emit_lossy(StudioEvent::SyncCompleted {
            session_id,
            sync_result_id: result.id,
            anchor_angle: result.anchor_angle.clone(),
            offsets_ms: result.offsets_ms.clone(),
            confidence: result.confidence.clone(),
            timestamp: now,
        });

        info!(
            session_id = %session_id,
            sync_result_id = %result.id,
            failed_angles = result.alignment_errors.len(),
            "Sync computed"
        );

        if settings.auto_approve && result.all_at_least(thresholds.looks_good_threshold) {
            info!(session_id = %session_id, "All angles look good, auto-approving");
            result.approve(AUTO_APPROVER, Some("auto-approved above looks-good threshold".into()));
            self.commit_approval(&mut session, &result).await?;
        }

        Ok(result)
    }

    /// Freeze the working offsets as active and fire `syncing → synced`
    pub async fn approve(
        &self,
        session_id: Uuid,
        approved_by: &str,
        notes: Option<String>,
    ) -> StudioResult<SyncResult> {
        let approved_by = approved_by.trim();
        if approved_by.is_empty() {
            return Err(StudioError::Validation("approved_by must not be empty".to_string()));
        }

        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_status("sync approval", REVIEW_STATES)?;
        let mut result = self.require_result(session_id).await?;

        let previous = result.approval.as_ref().map(|a| a.approved_by.clone());
        match result.approve(approved_by, notes) {
            ApprovalOutcome::AlreadyApproved => {
                debug!(session_id = %session_id, approved_by = %approved_by, "Sync already approved");
            }
            ApprovalOutcome::ApproverReplaced => {
                info!(
                    session_id = %session_id,
                    previous = previous.as_deref().unwrap_or(""),
                    approved_by = %approved_by,
                    "Sync re-approved by a different approver"
                );
                self.commit_approval(&mut session, &result).await?;
            }
            ApprovalOutcome::Approved => {
                info!(session_id = %session_id, approved_by = %approved_by, "Sync approved");
                self.commit_approval(&mut session, &result).await?;
            }
        }

        Ok(result)
    }

    /// Overwrite working offsets and clear approval; active offsets stay until re-approval
    pub async fn correct(
        &self,
        session_id: Uuid,
        offsets_ms: BTreeMap<String, i64>,
        corrected_by: &str,
        notes: Option<String>,
    ) -> StudioResult<SyncResult> {
        let corrected_by = corrected_by.trim();
        if corrected_by.is_empty() {
            return Err(StudioError::Validation("corrected_by must not be empty".to_string()));
        }
        if offsets_ms.is_empty() {
            return Err(StudioError::Validation("correction has no offsets".to_string()));
        }

        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_status("sync correction", REVIEW_STATES)?;
        let mut result = self.require_result(session_id).await?;

        let assets = db::list_assets(self.sessions.db(), session_id).await?;
        let registered: BTreeSet<&str> = assets
            .iter()
            .filter(|a| a.is_participating())
            .map(|a| a.angle.as_str())
            .collect();

        for (angle, offset) in &offsets_ms {
            if !registered.contains(angle.as_str()) {
                return Err(StudioError::Validation(format!(
                    "angle '{}' is not registered in session {}",
                    angle, session_id
                )));
            }
            if *angle == result.anchor_angle && *offset != 0 {
                return Err(StudioError::Validation(format!(
                    "anchor angle '{}' must keep offset 0",
                    angle
                )));
            }
        }

        let was_approved = result.is_approved();
        result.apply_correction(Correction {
            offsets_ms: offsets_ms.clone(),
            corrected_by: corrected_by.to_string(),
            notes,
            corrected_at: Utc::now(),
        });
        db::save_sync_result(self.sessions.db(), &result).await?;

        session.offsets_ms = result.offsets_ms.clone();
        self.sessions.save(&mut session).await?;

        info!(
            session_id = %session_id,
            corrected_by = %corrected_by,
            angles = offsets_ms.len(),
            approval_cleared = was_approved,
            "Sync offsets corrected"
        );

        self.sessions.event_bus().emit_lossy(StudioEvent::SyncCorrected {
            session_id,
            sync_result_id: result.id,
            corrected_by: corrected_by.to_string(),
            offsets_ms,
            timestamp: result.updated_at,
        });

        Ok(result)
    }

    pub async fn get_result(&self, session_id: Uuid) -> StudioResult<SyncResult> {
        self.sessions.get_session(session_id).await?;
        db::load_sync_result(self.sessions.db(), session_id)
            .await?
            .ok_or_else(|| StudioError::NotFound(format!("sync result for session {}", session_id)))
    }

    async fn require_result(&self, session_id: Uuid) -> StudioResult<SyncResult> {
        db::load_sync_result(self.sessions.db(), session_id)
            .await?
            .ok_or_else(|| {
                StudioError::Precondition(format!("session {} has no sync result", session_id))
            })
    }

    async fn align_one(&self, anchor: Arc<AudioTrack>, asset: &Asset) -> Result<Alignment, String> {
        let track = self.audio.load(asset).await.map_err(|e| e.to_string())?;
        let aligner = self.aligner.clone();

        tokio::task::spawn_blocking(move || aligner.align(&anchor, &track))
            .await
            .map_err(|e| format!("alignment task failed: {}", e))?
            .map_err(|e| e.to_string())
    }

    async fn commit_approval(&self, session: &mut Session, result: &SyncResult) -> StudioResult<()> {
        db::save_sync_result(self.sessions.db(), result).await?;

        if let Some(active) = result.active_offsets() {
            session.offsets_ms = active.clone();
        }
        if session.status == SessionStatus::Syncing {
            self.sessions.advance(session, SessionStatus::Synced).await?;
        } else {
            self.sessions.save(session).await?;
        }

        if let Some(approval) = &result.approval {
            self.sessions.event_bus().emit_lossy(StudioEvent::SyncApproved {
                session_id: session.id,
                sync_result_id: result.id,
                approved_by: approval.approved_by.clone(),
                timestamp: approval.approved_at,
            });
        }
        Ok(())
    }

    fn fail(&self, session_id: Uuid, reason: String) -> StudioError {
        warn!(session_id = %session_id, reason = %reason, "Sync computation failed");
        self.sessions.event_bus().emit_lossy(StudioEvent::SyncFailed {
            session_id,
            error: reason.clone(),
            timestamp: Utc::now(),
        });
        StudioError::SyncComputationFailed(reason)
    }
}

/// Check compute preconditions and pick the anchor and the angles to align
fn plan_alignment(
    session: &Session,
    assets: &[Asset],
    anchor: Option<&str>,
) -> StudioResult<(Asset, Vec<Asset>)> {
    session.ensure_status("sync computation", COMPUTE_STATES)?;

    if !all_assets_ready(assets) {
        return Err(StudioError::Precondition(format!(
            "session {} has assets that are not transcode-complete",
            session.id
        )));
    }

    let participating: Vec<&Asset> = assets.iter().filter(|a| a.is_participating()).collect();
    let anchor_asset = match anchor {
        Some(angle) => participating
            .iter()
            .find(|a| a.angle == angle)
            .ok_or_else(|| {
                StudioError::Validation(format!(
                    "anchor '{}' is not a participating angle of session {}",
                    angle, session.id
                ))
            })?,
        // Registration order
        None => participating.first().ok_or_else(|| {
            StudioError::Precondition(format!("session {} has no participating assets", session.id))
        })?,
    };

    let others = participating
        .iter()
        .filter(|a| a.angle != anchor_asset.angle)
        .map(|a| (*a).clone())
        .collect();

    Ok(((*anchor_asset).clone(), others))
}
