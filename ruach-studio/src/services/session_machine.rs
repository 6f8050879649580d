//! Session lifecycle orchestration
//!
//! Persists every accepted transition and broadcasts `SessionStatusChanged`.
//! Mutating callers hold the session's lock (see [`SessionLocks`]) across
//! load → mutate → save.

use chrono::Utc;
use ruach_common::events::{EventBus, StudioEvent};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{StudioError, StudioResult};
use crate::models::{Session, SessionStatus, StateTransition};

use super::SessionLocks;

#[derive(Clone)]
pub struct SessionMachine {
    db: SqlitePool,
    event_bus: EventBus,
    locks: SessionLocks,
}

impl SessionMachine {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self {
            db,
            event_bus,
            locks: SessionLocks::new(),
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    pub async fn create_session(&self, title: &str) -> StudioResult<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StudioError::Validation("session title must not be empty".to_string()));
        }

        let session = Session::new(title);
        db::save_session(&self.db, &session).await?;

        info!(session_id = %session.id, title = %session.title, "Session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> StudioResult<Session> {
        db::load_session(&self.db, session_id)
            .await?
            .ok_or_else(|| StudioError::NotFound(format!("session {}", session_id)))
    }

    pub async fn list_sessions(&self) -> StudioResult<Vec<Session>> {
        Ok(db::list_sessions(&self.db).await?)
    }

    /// Archive a session; archiving an archived session is a no-op
    pub async fn archive(&self, session_id: Uuid) -> StudioResult<Session> {
        let _guard = self.locks.lock(session_id).await;
        let mut session = self.get_session(session_id).await?;

        if session.status.is_archived() {
            return Ok(session);
        }

        self.advance(&mut session, SessionStatus::Archived).await?;
        Ok(session)
    }

    /// Apply a transition, persist it and broadcast it
    ///
    /// The caller must hold the session lock.
    pub async fn advance(
        &self,
        session: &mut Session,
        target: SessionStatus,
    ) -> StudioResult<StateTransition> {
        let transition = session.transition_to(target)?;
        db::save_session(&self.db, session).await?;

        info!(
            session_id = %transition.session_id,
            from = %transition.old_status,
            to = %transition.new_status,
            "Session status changed"
        );

        self.event_bus.emit_lossy(StudioEvent::SessionStatusChanged {
            session_id: transition.session_id,
            old_status: transition.old_status.to_string(),
            new_status: transition.new_status.to_string(),
            timestamp: transition.transitioned_at,
        });

        Ok(transition)
    }

    /// Persist non-status changes (offsets, render error, ...)
    pub async fn save(&self, session: &mut Session) -> StudioResult<()> {
        session.updated_at = Utc::now();
        db::save_session(&self.db, session).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    async fn machine() -> SessionMachine {
        let pool = init_memory_pool().await.unwrap();
        SessionMachine::new(pool, EventBus::new(16))
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let machine = machine().await;
        let err = machine.create_session("   ").await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[tokio::test]
    async fn advance_persists_and_emits() {
        let machine = machine().await;
        let mut rx = machine.event_bus().subscribe();
        let mut session = machine.create_session("Sunday service").await.unwrap();

        machine
            .advance(&mut session, SessionStatus::Ingesting)
            .await
            .unwrap();

        let stored = machine.get_session(session.id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::Ingesting);

        match rx.try_recv().unwrap() {
            StudioEvent::SessionStatusChanged { old_status, new_status, .. } => {
                assert_eq!(old_status, "draft");
                assert_eq!(new_status, "ingesting");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn skipping_a_status_is_a_precondition_failure() {
        let machine = machine().await;
        let mut session = machine.create_session("Skip").await.unwrap();

        let err = machine
            .advance(&mut session, SessionStatus::Synced)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Precondition(_)));
        assert_eq!(
            machine.get_session(session.id).await.unwrap().status,
            SessionStatus::Draft
        );
    }

    #[tokio::test]
    async fn archive_is_idempotent() {
        let machine = machine().await;
        let session = machine.create_session("Old").await.unwrap();

        let archived = machine.archive(session.id).await.unwrap();
        assert_eq!(archived.status, SessionStatus::Archived);

        let again = machine.archive(session.id).await.unwrap();
        assert_eq!(again.status, SessionStatus::Archived);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let machine = machine().await;
        let err = machine.get_session(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StudioError::NotFound(_)));
    }
}
