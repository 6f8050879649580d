//! Audio test fixture generator
//!
//! Writes pairs of WAV files that hold the same program audio, the second
//! starting later, so alignment can be checked against a known offset.

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// How much later the second file starts, in ms
    pub late_start_ms: u32,
    pub seed: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 20.0,
            sample_rate: 8_000,
            channels: 2,
            late_start_ms: 120,
            seed: 0x5eed,
        }
    }
}

/// Amplitude-modulated noise: syllable-length bursts of varying loudness
fn program_audio(config: &NoiseConfig, total: usize) -> Vec<i16> {
    let mut state = config.seed;
    let mut next = move || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (state >> 8) as f32 / (1u32 << 24) as f32
    };

    let burst = (config.sample_rate / 25) as usize;
    let mut gain = 0.0f32;
    (0..total)
        .map(|i| {
            if i % burst == 0 {
                gain = if next() < 0.3 { 0.02 } else { 0.2 + 0.6 * next() };
            }
            let sample = (next() * 2.0 - 1.0) * gain;
            (sample * i16::MAX as f32) as i16
        })
        .collect()
}

fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        for _ in 0..channels {
            writer.write_sample(*sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Write `anchor.wav` and `late.wav` into `dir`
///
/// `late.wav` misses the first `late_start_ms` of the program, so its
/// expected offset against the anchor is `-late_start_ms`.
pub fn write_offset_pair(dir: &Path, config: &NoiseConfig) -> anyhow::Result<(PathBuf, PathBuf)> {
    let total = (config.duration_seconds * config.sample_rate as f64) as usize;
    let program = program_audio(config, total);
    let skip = (config.late_start_ms as usize * config.sample_rate as usize) / 1000;

    let anchor = dir.join("anchor.wav");
    let late = dir.join("late.wav");
    write_wav(&anchor, config.sample_rate, config.channels, &program)?;
    write_wav(&late, config.sample_rate, config.channels, &program[skip..])?;

    Ok((anchor, late))
}

/// Two cameras recording the same room at different sample rates
#[derive(Debug, Clone)]
pub struct MixedRateConfig {
    pub duration_seconds: f64,
    pub anchor_rate: u32,
    pub late_rate: u32,
    pub late_start_ms: u32,
    pub seed: u64,
}

impl Default for MixedRateConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 20.0,
            anchor_rate: 48_000,
            late_rate: 44_100,
            late_start_ms: 120,
            seed: 0x5eed,
        }
    }
}

/// Tones under a loudness pattern that changes every 40 ms, defined in
/// continuous time so every sample rate sees the same program
fn tonal_program(config: &MixedRateConfig, rate: u32) -> Vec<i16> {
    let mut state = config.seed;
    let steps = (config.duration_seconds * 25.0) as usize + 1;
    let levels: Vec<f64> = (0..steps)
        .map(|_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        })
        .collect();

    let total = (config.duration_seconds * rate as f64) as usize;
    (0..total)
        .map(|i| {
            let t = i as f64 / rate as f64;
            let level = levels[((t * 25.0) as usize).min(steps - 1)];
            let carrier = (std::f64::consts::TAU * 220.0 * t).sin()
                + 0.5 * (std::f64::consts::TAU * 347.0 * t).sin();
            (0.5 * level * carrier * i16::MAX as f64) as i16
        })
        .collect()
}

/// Write `anchor.wav` at `anchor_rate` and `late.wav` at `late_rate`
///
/// `late.wav` misses the first `late_start_ms` of the program.
pub fn write_mixed_rate_pair(
    dir: &Path,
    config: &MixedRateConfig,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    let anchor_program = tonal_program(config, config.anchor_rate);
    let late_program = tonal_program(config, config.late_rate);
    let skip = (config.late_start_ms as usize * config.late_rate as usize) / 1000;

    let anchor = dir.join("anchor.wav");
    let late = dir.join("late.wav");
    write_wav(&anchor, config.anchor_rate, 1, &anchor_program)?;
    write_wav(&late, config.late_rate, 2, &late_program[skip..])?;

    Ok((anchor, late))
}
