//! Audio loading for alignment
//!
//! The default source decodes the WAV file at each asset's audio rendition
//! with `hound` on a blocking thread and downmixes it to mono f32.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::Asset;

use super::AlignmentError;

/// Mono PCM samples in [-1, 1]
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioTrack {
    pub fn duration_ms(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as i64 * 1000) / self.sample_rate as i64
    }
}

/// Supplies decoded audio for an asset
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn load(&self, asset: &Asset) -> Result<AudioTrack, AlignmentError>;
}

/// Reads `renditions.audio` as a WAV file; relative paths resolve against `media_root`
pub struct WavAudioSource {
    media_root: PathBuf,
}

impl WavAudioSource {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }
}

#[async_trait]
impl AudioSource for WavAudioSource {
    async fn load(&self, asset: &Asset) -> Result<AudioTrack, AlignmentError> {
        let location = asset.renditions.audio.as_deref().ok_or_else(|| {
            AlignmentError::MissingAudio(format!("angle '{}' has no audio rendition", asset.angle))
        })?;
        let path = self.resolve(location);

        debug!(angle = %asset.angle, path = %path.display(), "Decoding alignment audio");

        tokio::task::spawn_blocking(move || read_wav_mono(&path))
            .await
            .map_err(|e| AlignmentError::Decode(format!("decode task failed: {}", e)))?
    }
}

/// Decode a WAV file, averaging channels into mono
pub fn read_wav_mono(path: &Path) -> Result<AudioTrack, AlignmentError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| AlignmentError::Decode(format!("{}: {}", path.display(), e)))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AlignmentError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AlignmentError::Decode(e.to_string()))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(AudioTrack {
        sample_rate: spec.sample_rate,
        samples,
    })
}
