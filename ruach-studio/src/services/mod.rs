//! Orchestration services
//!
//! The session machine owns lifecycle status; every other service reaches
//! session state through it and serializes per-session mutations with its locks.

pub mod alignment;
pub mod audio_source;
pub mod cut_strategy;
pub mod edl_compiler;
pub mod ingestion;
pub mod rate_limiter;
pub mod render_queue;
pub mod session_locks;
pub mod session_machine;
pub mod subtitle;
pub mod sync_engine;
pub mod transcript_generator;
pub mod transcription;

pub use alignment::{Alignment, AlignmentError, AudioAligner, CrossCorrelationAligner};
pub use audio_source::{AudioSource, AudioTrack, WavAudioSource};
pub use cut_strategy::{CutStrategy, CutStrategyConfig, TimedSegment};
pub use edl_compiler::EdlCompiler;
pub use ingestion::IngestionTracker;
pub use rate_limiter::{
    CounterStore, InMemoryCounterStore, OperationClass, RateDecision, RateLimiter,
};
pub use render_queue::RenderQueue;
pub use session_locks::SessionLocks;
pub use session_machine::SessionMachine;
pub use sync_engine::{SyncEngine, SyncSettings, AUTO_APPROVER};
pub use transcript_generator::TranscriptGenerator;
pub use transcription::{
    provider_from_config, HttpTranscriptionProvider, MockTranscriptionProvider, ProviderSegment,
    TranscriptionError, TranscriptionOutput, TranscriptionProvider, TranscriptionRequest,
};
