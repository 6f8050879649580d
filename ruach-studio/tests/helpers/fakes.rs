//! Deterministic stand-ins for audio, alignment and transcription

use async_trait::async_trait;
use ruach_studio::models::Asset;
use ruach_studio::services::{
    Alignment, AlignmentError, AudioAligner, AudioSource, AudioTrack, TranscriptionError,
    TranscriptionOutput, TranscriptionProvider, TranscriptionRequest,
};
use std::collections::BTreeMap;

/// Tracks carry the angle's first letter as their only sample value
pub struct LetterAudio;

#[async_trait]
impl AudioSource for LetterAudio {
    async fn load(&self, asset: &Asset) -> Result<AudioTrack, AlignmentError> {
        let letter = asset
            .angle
            .bytes()
            .next()
            .ok_or_else(|| AlignmentError::MissingAudio(asset.angle.clone()))?;
        Ok(AudioTrack {
            sample_rate: 8_000,
            samples: vec![letter as f32; 8],
        })
    }
}

/// Returns a fixed alignment per angle letter; unlisted angles fail
pub struct ScriptedAligner {
    table: BTreeMap<char, Alignment>,
}

impl ScriptedAligner {
    pub fn new(alignments: &[(&str, i64, f64)]) -> Self {
        let table = alignments
            .iter()
            .filter_map(|(angle, offset_ms, confidence)| {
                angle.chars().next().map(|c| {
                    (
                        c,
                        Alignment {
                            offset_ms: *offset_ms,
                            confidence: *confidence,
                        },
                    )
                })
            })
            .collect();
        Self { table }
    }
}

impl AudioAligner for ScriptedAligner {
    fn method(&self) -> &str {
        "scripted"
    }

    fn align(&self, _anchor: &AudioTrack, other: &AudioTrack) -> Result<Alignment, AlignmentError> {
        let letter = other.samples.first().map(|s| *s as u8 as char).unwrap_or('?');
        self.table
            .get(&letter)
            .copied()
            .ok_or_else(|| AlignmentError::SilentTrack(format!("angle {}", letter)))
    }
}

/// Provider that always answers with a 503
pub struct FailingProvider;

#[async_trait]
impl TranscriptionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn transcribe(
        &self,
        _request: &TranscriptionRequest,
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        Err(TranscriptionError::Provider(503, "provider overloaded".to_string()))
    }
}
