//! Asset ingestion tracking
//!
//! Records upload and transcode callbacks per angle and fires
//! `draft → ingesting` on first registration and `ingesting → needs-review`
//! once every participating asset is transcode-complete. Angles may still be
//! registered and reported while the session is `needs-review`; sync
//! re-checks readiness before it runs.

use chrono::Utc;
use ruach_common::events::StudioEvent;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{Asset, Renditions, Session, SessionStatus, TranscodeStatus, UploadStatus};

use super::SessionMachine;

/// States in which assets may be registered
const REGISTRATION_STATES: &[SessionStatus] = &[
    SessionStatus::Draft,
    SessionStatus::Ingesting,
    SessionStatus::NeedsReview,
];

/// States in which upload and transcode callbacks are accepted
const INTAKE_STATES: &[SessionStatus] = &[SessionStatus::Ingesting, SessionStatus::NeedsReview];

/// True iff at least one participating asset exists and all of them are transcode-complete
pub fn all_assets_ready(assets: &[Asset]) -> bool {
    let mut participating = assets.iter().filter(|a| a.is_participating()).peekable();
    participating.peek().is_some() && participating.all(|a| a.is_ready())
}

#[derive(Clone)]
pub struct IngestionTracker {
    sessions: SessionMachine,
}

impl IngestionTracker {
    pub fn new(sessions: SessionMachine) -> Self {
        Self { sessions }
    }

    pub async fn register_asset(
        &self,
        session_id: Uuid,
        angle: &str,
        filename: &str,
    ) -> StudioResult<Asset> {
        let angle = angle.trim();
        if angle.is_empty() {
            return Err(StudioError::Validation("angle label must not be empty".to_string()));
        }

        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.sessions.get_session(session_id).await?;
        session.ensure_status("asset registration", REGISTRATION_STATES)?;

        if db::load_asset(self.sessions.db(), session_id, angle).await?.is_some() {
            return Err(StudioError::Validation(format!(
                "angle '{}' is already registered in session {}",
                angle, session_id
            )));
        }

        let asset = Asset::new(session_id, angle, filename);
        db::save_asset(self.sessions.db(), &asset).await?;

        info!(session_id = %session_id, angle = %angle, filename = %filename, "Asset registered");
        self.emit_asset(&asset);

        match session.status {
            SessionStatus::Draft => {
                self.sessions
                    .advance(&mut session, SessionStatus::Ingesting)
                    .await?;
            }
            SessionStatus::NeedsReview => {
                info!(session_id = %session_id, angle = %angle, "Late angle registered; sync waits for its transcode");
            }
            _ => {}
        }

        Ok(asset)
    }

    /// Upload finished; also the re-upload path for failed or excluded assets
    pub async fn report_upload_complete(
        &self,
        session_id: Uuid,
        angle: &str,
        original_location: Option<String>,
    ) -> StudioResult<Asset> {
        let _guard = self.sessions.locks().lock(session_id).await;
        self.intake_session(session_id, "upload report").await?;
        let mut asset = self.load_asset(session_id, angle).await?;

        if asset.transcode_status == TranscodeStatus::Complete && !asset.excluded {
            return Err(StudioError::Precondition(format!(
                "angle '{}' is already transcoded",
                angle
            )));
        }

        asset.upload_status = UploadStatus::Complete;
        asset.transcode_status = TranscodeStatus::Processing;
        asset.failure_reason = None;
        asset.excluded = false;
        if original_location.is_some() {
            asset.renditions.original = original_location;
        }
        asset.updated_at = Utc::now();
        db::save_asset(self.sessions.db(), &asset).await?;

        info!(session_id = %session_id, angle = %angle, "Upload complete, transcoding");
        self.emit_asset(&asset);

        Ok(asset)
    }

    pub async fn report_upload_failed(
        &self,
        session_id: Uuid,
        angle: &str,
        reason: &str,
    ) -> StudioResult<Asset> {
        let _guard = self.sessions.locks().lock(session_id).await;
        self.intake_session(session_id, "upload report").await?;
        let mut asset = self.load_asset(session_id, angle).await?;

        if asset.transcode_status == TranscodeStatus::Complete {
            return Err(StudioError::Precondition(format!(
                "angle '{}' is already transcoded",
                angle
            )));
        }

        asset.upload_status = UploadStatus::Failed;
        asset.transcode_status = TranscodeStatus::Pending;
        asset.failure_reason = Some(reason.to_string());
        asset.updated_at = Utc::now();
        db::save_asset(self.sessions.db(), &asset).await?;

        warn!(session_id = %session_id, angle = %angle, reason = %reason, "Upload failed");
        self.emit_asset(&asset);
        Ok(asset)
    }

    pub async fn report_transcode_complete(
        &self,
        session_id: Uuid,
        angle: &str,
        duration_ms: i64,
        renditions: Renditions,
    ) -> StudioResult<Asset> {
        if duration_ms <= 0 {
            return Err(StudioError::Validation(format!(
                "duration_ms must be positive, got {}",
                duration_ms
            )));
        }

        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.intake_session(session_id, "transcode report").await?;
        let mut asset = self.load_asset(session_id, angle).await?;
        Self::ensure_transcoding(&asset)?;

        asset.transcode_status = TranscodeStatus::Complete;
        asset.duration_ms = Some(duration_ms);
        asset.failure_reason = None;
        merge_renditions(&mut asset.renditions, renditions);
        asset.updated_at = Utc::now();
        db::save_asset(self.sessions.db(), &asset).await?;

        info!(session_id = %session_id, angle = %angle, duration_ms, "Transcode complete");
        self.emit_asset(&asset);

        self.evaluate_readiness(&mut session).await?;
        Ok(asset)
    }

    /// Keeps the session in `ingesting` until the angle is re-uploaded or excluded
    pub async fn report_transcode_failed(
        &self,
        session_id: Uuid,
        angle: &str,
        reason: &str,
    ) -> StudioResult<Asset> {
        let _guard = self.sessions.locks().lock(session_id).await;
        self.intake_session(session_id, "transcode report").await?;
        let mut asset = self.load_asset(session_id, angle).await?;
        Self::ensure_transcoding(&asset)?;

        asset.transcode_status = TranscodeStatus::Failed;
        asset.failure_reason = Some(reason.to_string());
        asset.updated_at = Utc::now();
        db::save_asset(self.sessions.db(), &asset).await?;

        warn!(session_id = %session_id, angle = %angle, reason = %reason, "Transcode failed");
        self.emit_asset(&asset);
        Ok(asset)
    }

    /// Drop an angle from readiness, sync and editing
    pub async fn exclude_asset(&self, session_id: Uuid, angle: &str) -> StudioResult<Asset> {
        let _guard = self.sessions.locks().lock(session_id).await;
        let mut session = self.intake_session(session_id, "asset exclusion").await?;
        let mut asset = self.load_asset(session_id, angle).await?;

        if asset.excluded {
            return Ok(asset);
        }

        asset.excluded = true;
        asset.updated_at = Utc::now();
        db::save_asset(self.sessions.db(), &asset).await?;

        info!(session_id = %session_id, angle = %angle, "Asset excluded");
        self.emit_asset(&asset);

        self.evaluate_readiness(&mut session).await?;
        Ok(asset)
    }

    pub async fn all_assets_ready(&self, session_id: Uuid) -> StudioResult<bool> {
        self.sessions.get_session(session_id).await?;
        let assets = db::list_assets(self.sessions.db(), session_id).await?;
        Ok(all_assets_ready(&assets))
    }

    pub async fn list_assets(&self, session_id: Uuid) -> StudioResult<Vec<Asset>> {
        self.sessions.get_session(session_id).await?;
        Ok(db::list_assets(self.sessions.db(), session_id).await?)
    }

    async fn intake_session(&self, session_id: Uuid, operation: &str) -> StudioResult<Session> {
        let session = self.sessions.get_session(session_id).await?;
        session.ensure_status(operation, INTAKE_STATES)?;
        Ok(session)
    }

    async fn load_asset(&self, session_id: Uuid, angle: &str) -> StudioResult<Asset> {
        db::load_asset(self.sessions.db(), session_id, angle)
            .await?
            .ok_or_else(|| {
                StudioError::NotFound(format!("angle '{}' in session {}", angle, session_id))
            })
    }

    fn ensure_transcoding(asset: &Asset) -> StudioResult<()> {
        if asset.upload_status != UploadStatus::Complete
            || asset.transcode_status != TranscodeStatus::Processing
        {
            return Err(StudioError::Precondition(format!(
                "angle '{}' is not transcoding (upload {}, transcode {})",
                asset.angle, asset.upload_status, asset.transcode_status
            )));
        }
        Ok(())
    }

    /// Fire `ingesting → needs-review` when the readiness predicate holds
    async fn evaluate_readiness(&self, session: &mut Session) -> StudioResult<()> {
        if session.status != SessionStatus::Ingesting {
            return Ok(());
        }

        let assets = db::list_assets(self.sessions.db(), session.id).await?;
        if all_assets_ready(&assets) {
            self.sessions
                .advance(session, SessionStatus::NeedsReview)
                .await?;
        }
        Ok(())
    }

    fn emit_asset(&self, asset: &Asset) {
        self.sessions.event_bus().emit_lossy(StudioEvent::AssetUpdated {
            session_id: asset.session_id,
            asset_id: asset.id,
            angle: asset.angle.clone(),
            upload_status: asset.upload_status.to_string(),
            transcode_status: asset.transcode_status.to_string(),
            timestamp: asset.updated_at,
        });
    }
}

fn merge_renditions(current: &mut Renditions, reported: Renditions) {
    if reported.original.is_some() {
        current.original = reported.original;
    }
    if reported.proxy.is_some() {
        current.proxy = reported.proxy;
    }
    if reported.mezzanine.is_some() {
        current.mezzanine = reported.mezzanine;
    }
    if reported.audio.is_some() {
        current.audio = reported.audio;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use ruach_common::events::EventBus;

    async fn tracker() -> IngestionTracker {
        let pool = init_memory_pool().await.unwrap();
        IngestionTracker::new(SessionMachine::new(pool, EventBus::new(64)))
    }

    fn renditions(angle: &str) -> Renditions {
        Renditions {
            proxy: Some(format!("proxy/{}.mp4", angle)),
            audio: Some(format!("audio/{}.wav", angle)),
            ..Default::default()
        }
    }

    #[test]
    fn zero_assets_are_not_ready() {
        assert!(!all_assets_ready(&[]));
    }

    #[test]
    fn excluded_assets_do_not_count() {
        let session_id = Uuid::new_v4();
        let mut a = Asset::new(session_id, "A", "a.mov");
        a.transcode_status = TranscodeStatus::Complete;
        let mut b = Asset::new(session_id, "B", "b.mov");
        b.transcode_status = TranscodeStatus::Failed;

        assert!(!all_assets_ready(&[a.clone(), b.clone()]));
        b.excluded = true;
        assert!(all_assets_ready(&[a.clone(), b.clone()]));
        a.excluded = true;
        assert!(!all_assets_ready(&[a, b]));
    }

    #[tokio::test]
    async fn first_registration_starts_ingestion() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();

        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();

        let session = tracker.sessions.get_session(session.id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Ingesting);
        assert!(!tracker.all_assets_ready(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_angle_is_rejected() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();

        let err = tracker
            .register_asset(session.id, "A", "a2.mov")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[tokio::test]
    async fn last_transcode_moves_to_needs_review() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        for angle in ["A", "B"] {
            tracker.register_asset(session.id, angle, "x.mov").await.unwrap();
            tracker
                .report_upload_complete(session.id, angle, None)
                .await
                .unwrap();
        }

        tracker
            .report_transcode_complete(session.id, "A", 60_000, renditions("A"))
            .await
            .unwrap();
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::Ingesting
        );

        tracker
            .report_transcode_complete(session.id, "B", 61_000, renditions("B"))
            .await
            .unwrap();
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::NeedsReview
        );
    }

    #[tokio::test]
    async fn transcode_failure_holds_until_reupload_or_exclusion() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        for angle in ["A", "B"] {
            tracker.register_asset(session.id, angle, "x.mov").await.unwrap();
            tracker
                .report_upload_complete(session.id, angle, None)
                .await
                .unwrap();
        }
        tracker
            .report_transcode_complete(session.id, "A", 60_000, renditions("A"))
            .await
            .unwrap();
        let failed = tracker
            .report_transcode_failed(session.id, "B", "codec unsupported")
            .await
            .unwrap();
        assert_eq!(failed.failure_reason.as_deref(), Some("codec unsupported"));
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::Ingesting
        );

        tracker.exclude_asset(session.id, "B").await.unwrap();
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::NeedsReview
        );
    }

    #[tokio::test]
    async fn angle_registered_after_readiness_is_still_tracked() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();
        tracker
            .report_upload_complete(session.id, "A", None)
            .await
            .unwrap();
        tracker
            .report_transcode_complete(session.id, "A", 60_000, renditions("A"))
            .await
            .unwrap();
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::NeedsReview
        );

        tracker.register_asset(session.id, "B", "b.mov").await.unwrap();
        assert!(!tracker.all_assets_ready(session.id).await.unwrap());

        tracker
            .report_upload_complete(session.id, "B", None)
            .await
            .unwrap();
        tracker
            .report_transcode_complete(session.id, "B", 60_000, renditions("B"))
            .await
            .unwrap();
        assert!(tracker.all_assets_ready(session.id).await.unwrap());
        assert_eq!(
            tracker.sessions.get_session(session.id).await.unwrap().status,
            SessionStatus::NeedsReview
        );
    }

    #[tokio::test]
    async fn registration_closes_once_syncing() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();
        tracker
            .report_upload_complete(session.id, "A", None)
            .await
            .unwrap();
        tracker
            .report_transcode_complete(session.id, "A", 60_000, renditions("A"))
            .await
            .unwrap();

        let mut session = tracker.sessions.get_session(session.id).await.unwrap();
        tracker
            .sessions
            .advance(&mut session, SessionStatus::Syncing)
            .await
            .unwrap();

        let err = tracker
            .register_asset(session.id, "B", "b.mov")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Precondition(_)));
    }

    #[tokio::test]
    async fn transcode_report_requires_upload() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();

        let err = tracker
            .report_transcode_complete(session.id, "A", 1_000, Renditions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Precondition(_)));
    }

    #[tokio::test]
    async fn unknown_angle_is_not_found() {
        let tracker = tracker().await;
        let session = tracker.sessions.create_session("Service").await.unwrap();
        tracker.register_asset(session.id, "A", "a.mov").await.unwrap();

        let err = tracker
            .report_upload_complete(session.id, "Z", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::NotFound(_)));
    }
}
