//! Render job queue
//!
//! Jobs are submitted by users (rate limited per operation class) and driven
//! through their lifecycle by the external render worker's callbacks.

use chrono::Utc;
use ruach_common::events::StudioEvent;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{RenderArtifacts, RenderJob, RenderJobStatus, SessionStatus};

use super::{OperationClass, RateLimiter, SessionMachine};

const SUBMIT_STATES: &[SessionStatus] = &[SessionStatus::Editing, SessionStatus::Rendering];

#[derive(Clone)]
pub struct RenderQueue {
    sessions: SessionMachine,
    rate_limiter: RateLimiter,
}

impl RenderQueue {
    pub fn new(sessions: SessionMachine, rate_limiter: RateLimiter) -> Self {
        Self {
            sessions,
            rate_limiter,
        }
    }

    /// Queue an approved EDL version; a resubmission after failure is a retry
    pub async fn submit(
        &self,
        user_id: &str,
        session_id: Uuid,
        edl_version: i64,
        priority: i32,
    ) -> StudioResult<RenderJob> {
        self.rate_limiter.check(user_id, OperationClass::Create).await?;

        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_status("render submission", SUBMIT_STATES)?;

        let edl = db::load_edl(self.sessions.db(), session_id, edl_version)
            .await?
            .ok_or_else(|| {
                StudioError::NotFound(format!(
                    "EDL version {} of session {}",
                    edl_version, session_id
                ))
            })?;
        if !edl.is_approved() {
            return Err(StudioError::Precondition(format!(
                "EDL version {} is not approved",
                edl_version
            )));
        }

        let job = RenderJob::queued(user_id, session_id, edl_version, priority);
        db::save_render_job(self.sessions.db(), &job).await?;

        info!(
            session_id = %session_id,
            job_id = %job.id,
            user_id = %user_id,
            edl_version,
            priority,
            "Render job queued"
        );

        if session.status == SessionStatus::Editing {
            self.sessions
                .advance(&mut session, SessionStatus::Rendering)
                .await?;
        }

        self.emit(&job);
        Ok(job)
    }

    /// Cancel while `queued` or `processing`; cancelling a cancelled job is a no-op
    pub async fn cancel(&self, user_id: &str, job_id: Uuid) -> StudioResult<RenderJob> {
        self.rate_limiter.check(user_id, OperationClass::Cancel).await?;

        let session_id = self.load(job_id).await?.session_id;
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut job = self.load(job_id).await?;

        if job.status == RenderJobStatus::Cancelled {
            return Ok(job);
        }
        if !job.status.is_cancellable() {
            return Err(StudioError::Precondition(format!(
                "render job {} is {} and can no longer be cancelled",
                job_id, job.status
            )));
        }

        job.status = RenderJobStatus::Cancelled;
        job.updated_at = Utc::now();
        db::save_render_job(self.sessions.db(), &job).await?;

        info!(job_id = %job_id, user_id = %user_id, "Render job cancelled");
        self.emit(&job);
        Ok(job)
    }

    pub async fn status(&self, user_id: &str, job_id: Uuid) -> StudioResult<RenderJob> {
        self.rate_limiter.check(user_id, OperationClass::Status).await?;
        self.load(job_id).await
    }

    pub async fn list(&self, user_id: &str, session_id: Uuid) -> StudioResult<Vec<RenderJob>> {
        self.rate_limiter.check(user_id, OperationClass::List).await?;
        self.sessions.get_session(session_id).await?;
        Ok(db::list_render_jobs(self.sessions.db(), session_id).await?)
    }

    /// Worker callback: advance to `processing`/`rendering` or update progress
    pub async fn report_progress(
        &self,
        job_id: Uuid,
        status: RenderJobStatus,
        progress: f64,
    ) -> StudioResult<RenderJob> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(StudioError::Validation(format!(
                "progress must lie in [0, 1], got {}",
                progress
            )));
        }
        if !matches!(status, RenderJobStatus::Processing | RenderJobStatus::Rendering) {
            return Err(StudioError::Validation(format!(
                "progress reports carry processing or rendering, got {}",
                status
            )));
        }

        let session_id = self.load(job_id).await?.session_id;
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut job = self.load(job_id).await?;

        if job.status != status {
            self.ensure_transition(&job, status)?;
            if status == RenderJobStatus::Processing {
                job.started_at = Some(Utc::now());
            }
            job.status = status;
        }
        job.progress = progress.max(job.progress);
        job.updated_at = Utc::now();
        db::save_render_job(self.sessions.db(), &job).await?;

        self.emit(&job);
        Ok(job)
    }

    /// Worker callback: job finished, session is published
    pub async fn complete(&self, job_id: Uuid, artifacts: RenderArtifacts) -> StudioResult<RenderJob> {
        if artifacts.video.trim().is_empty() {
            return Err(StudioError::Validation("artifacts.video must not be empty".to_string()));
        }

        let session_id = self.load(job_id).await?.session_id;
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut job = self.load(job_id).await?;
        self.ensure_transition(&job, RenderJobStatus::Completed)?;

        let now = Utc::now();
        job.status = RenderJobStatus::Completed;
        job.progress = 1.0;
        job.artifacts = Some(artifacts);
        job.completed_at = Some(now);
        job.updated_at = now;
        db::save_render_job(self.sessions.db(), &job).await?;

        info!(session_id = %session_id, job_id = %job_id, "Render job completed");

        let mut session = self.sessions.get_session(session_id).await?;
        session.last_render_error = None;
        if session.status == SessionStatus::Rendering {
            self.sessions
                .advance(&mut session, SessionStatus::Published)
                .await?;
        } else {
            self.sessions.save(&mut session).await?;
        }

        self.emit(&job);
        Ok(job)
    }

    /// Worker callback: job failed; the session stays in `rendering` with the reason
    pub async fn fail(&self, job_id: Uuid, reason: &str) -> StudioResult<RenderJob> {
        let session_id = self.load(job_id).await?.session_id;
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut job = self.load(job_id).await?;
        self.ensure_transition(&job, RenderJobStatus::Failed)?;

        let now = Utc::now();
        job.status = RenderJobStatus::Failed;
        job.failure_reason = Some(reason.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;
        db::save_render_job(self.sessions.db(), &job).await?;

        warn!(session_id = %session_id, job_id = %job_id, reason = %reason, "Render job failed");

        let mut session = self.sessions.get_session(session_id).await?;
        if session.status == SessionStatus::Rendering {
            session.last_render_error = Some(reason.to_string());
            self.sessions.save(&mut session).await?;
        }

        self.emit(&job);
        Ok(job)
    }

    async fn load(&self, job_id: Uuid) -> StudioResult<RenderJob> {
        db::load_render_job(self.sessions.db(), job_id)
            .await?
            .ok_or_else(|| StudioError::NotFound(format!("render job {}", job_id)))
    }

    fn ensure_transition(&self, job: &RenderJob, target: RenderJobStatus) -> StudioResult<()> {
        if !job.status.can_transition_to(target) {
            return Err(StudioError::Precondition(format!(
                "render job {} cannot move from {} to {}",
                job.id, job.status, target
            )));
        }
        Ok(())
    }

    fn emit(&self, job: &RenderJob) {
        self.sessions.event_bus().emit_lossy(StudioEvent::RenderJobUpdated {
            session_id: job.session_id,
            job_id: job.id,
            status: job.status.to_string(),
            progress: job.progress,
            failure_reason: job.failure_reason.clone(),
            timestamp: job.updated_at,
        });
    }
}
