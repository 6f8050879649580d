//! Data models for the studio engine

pub mod asset;
pub mod edl;
pub mod render_job;
pub mod session;
pub mod sync_result;
pub mod transcript;

pub use asset::{Asset, Renditions, TranscodeStatus, UploadStatus};
pub use edl::{
    AngleUsage, Chapter, Edl, EdlAudit, EdlMetrics, EdlSource, EdlStatus, ProgramEntry,
};
pub use render_job::{RenderArtifacts, RenderJob, RenderJobStatus};
pub use session::{Session, SessionStatus, StateTransition};
pub use sync_result::{
    Approval, ApprovalOutcome, Correction, SyncClassification, SyncResult, SyncThresholds,
};
pub use transcript::{
    Segment, SubtitleFormat, Transcript, TranscriptStats, TranscriptStatus, WordTiming,
};
