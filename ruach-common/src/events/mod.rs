//! Event types for the studio event system
//!
//! Provides the shared event definitions and the EventBus used by the engine and the SSE endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Studio event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Status values are carried in their wire form (`"needs-review"`, `"queued"`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StudioEvent {
    /// Session lifecycle status changed
    SessionStatusChanged {
        session_id: Uuid,
        old_status: String,
        new_status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upload or transcode state of one angle changed
    AssetUpdated {
        session_id: Uuid,
        asset_id: Uuid,
        angle: String,
        upload_status: String,
        transcode_status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sync computation stored a new result
    SyncCompleted {
        session_id: Uuid,
        sync_result_id: Uuid,
        anchor_angle: String,
        offsets_ms: BTreeMap<String, i64>,
        confidence: BTreeMap<String, f64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sync computation failed; session status unchanged
    SyncFailed {
        session_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sync result approved (or approval metadata replaced)
    SyncApproved {
        session_id: Uuid,
        sync_result_id: Uuid,
        approved_by: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Working offsets corrected; approval cleared
    SyncCorrected {
        session_id: Uuid,
        sync_result_id: Uuid,
        corrected_by: String,
        offsets_ms: BTreeMap<String, i64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    TranscriptCompleted {
        session_id: Uuid,
        transcript_id: Uuid,
        segment_count: usize,
        duration_ms: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    TranscriptFailed {
        session_id: Uuid,
        transcript_id: Uuid,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    EdlCompiled {
        session_id: Uuid,
        edl_id: Uuid,
        version: i64,
        cut_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    EdlApproved {
        session_id: Uuid,
        edl_id: Uuid,
        version: i64,
        approved_by: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Render job created, progressed, completed, failed or cancelled
    RenderJobUpdated {
        session_id: Uuid,
        job_id: Uuid,
        status: String,
        progress: f64,
        failure_reason: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StudioEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            StudioEvent::SessionStatusChanged { .. } => "SessionStatusChanged",
            StudioEvent::AssetUpdated { .. } => "AssetUpdated",
            StudioEvent::SyncCompleted { .. } => "SyncCompleted",
            StudioEvent::SyncFailed { .. } => "SyncFailed",
            StudioEvent::SyncApproved { .. } => "SyncApproved",
            StudioEvent::SyncCorrected { .. } => "SyncCorrected",
            StudioEvent::TranscriptCompleted { .. } => "TranscriptCompleted",
            StudioEvent::TranscriptFailed { .. } => "TranscriptFailed",
            StudioEvent::EdlCompiled { .. } => "EdlCompiled",
            StudioEvent::EdlApproved { .. } => "EdlApproved",
            StudioEvent::RenderJobUpdated { .. } => "RenderJobUpdated",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            StudioEvent::SessionStatusChanged { session_id, .. }
            | StudioEvent::AssetUpdated { session_id, .. }
            | StudioEvent::SyncCompleted { session_id, .. }
            | StudioEvent::SyncFailed { session_id, .. }
            | StudioEvent::SyncApproved { session_id, .. }
            | StudioEvent::SyncCorrected { session_id, .. }
            | StudioEvent::TranscriptCompleted { session_id, .. }
            | StudioEvent::TranscriptFailed { session_id, .. }
            | StudioEvent::EdlCompiled { session_id, .. }
            | StudioEvent::EdlApproved { session_id, .. }
            | StudioEvent::RenderJobUpdated { session_id, .. } => *session_id,
        }
    }
}

/// Central event distribution bus
///
/// Wraps a `tokio::sync::broadcast` channel: producers never block on slow
/// subscribers, and lagging subscribers observe `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use ruach_common::events::{EventBus, StudioEvent};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(StudioEvent::SyncFailed {
///     session_id: Uuid::new_v4(),
///     error: "insufficient overlap".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StudioEvent,
    ) -> Result<usize, broadcast::error::SendError<StudioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StudioEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let session_id = Uuid::new_v4();
        let event = StudioEvent::SessionStatusChanged {
            session_id,
            old_status: "syncing".to_string(),
            new_status: "synced".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SessionStatusChanged");
        assert_eq!(json["new_status"], "synced");
        assert_eq!(event.event_type(), "SessionStatusChanged");
        assert_eq!(event.session_id(), session_id);
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus
            .emit(StudioEvent::EdlApproved {
                session_id: Uuid::new_v4(),
                edl_id: Uuid::new_v4(),
                version: 2,
                approved_by: "producer".to_string(),
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                StudioEvent::EdlApproved { version, .. } => assert_eq!(version, 2),
                other => panic!("unexpected event {}", other.event_type()),
            }
        }
    }

    #[test]
    fn emit_without_subscribers_is_an_error_but_lossy_is_not() {
        let bus = EventBus::new(4);
        let event = StudioEvent::SyncFailed {
            session_id: Uuid::new_v4(),
            error: "anchor audio missing".to_string(),
            timestamp: chrono::Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.capacity(), 4);
    }
}
