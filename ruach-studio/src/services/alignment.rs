//! Audio alignment between camera angles
//!
//! Offsets follow `angle_time = anchor_time + offset_ms`: an angle whose
//! recording started 120 ms after the anchor's gets `-120`.
//!
//! The default aligner resamples both tracks to a common analysis rate
//! (`rubato`), then cross-correlates 1 ms RMS envelopes in the frequency
//! domain (`rustfft`). Envelopes tolerate the differing microphones and gain
//! staging of separate cameras far better than raw-sample correlation.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use rustfft::{num_complex::Complex, FftPlanner};
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

use super::AudioTrack;

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("No audio: {0}")]
    MissingAudio(String),

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Track is silent: {0}")]
    SilentTrack(String),

    #[error("Insufficient overlap: {overlap_ms}ms (need {required_ms}ms)")]
    InsufficientOverlap { overlap_ms: i64, required_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    pub offset_ms: i64,
    /// [0, 1]; non-increasing as overlap shrinks or noise grows
    pub confidence: f64,
}

/// Pairwise alignment primitive, run on a blocking thread
pub trait AudioAligner: Send + Sync {
    /// Method label recorded on the sync result
    fn method(&self) -> &str;

    fn align(&self, anchor: &AudioTrack, other: &AudioTrack) -> Result<Alignment, AlignmentError>;
}

/// Rate both tracks are brought to before their envelopes are compared
pub const ANALYSIS_SAMPLE_RATE: u32 = 8_000;

/// FFT cross-correlation of RMS envelopes
#[derive(Debug, Clone)]
pub struct CrossCorrelationAligner {
    max_lag_ms: i64,
    min_overlap_ms: i64,
}

impl CrossCorrelationAligner {
    pub fn new(max_lag_ms: i64, min_overlap_ms: i64) -> Self {
        Self {
            max_lag_ms: max_lag_ms.max(0),
            min_overlap_ms: min_overlap_ms.max(1),
        }
    }
}

impl Default for CrossCorrelationAligner {
    fn default() -> Self {
        Self::new(30_000, 5_000)
    }
}

impl AudioAligner for CrossCorrelationAligner {
    fn method(&self) -> &str {
        "envelope-xcorr"
    }

    fn align(&self, anchor: &AudioTrack, other: &AudioTrack) -> Result<Alignment, AlignmentError> {
        let anchor = resample_to(anchor, ANALYSIS_SAMPLE_RATE, "anchor")?;
        let other = resample_to(other, ANALYSIS_SAMPLE_RATE, "angle")?;
        let a = envelope(&anchor, "anchor")?;
        let b = envelope(&other, "angle")?;

        let shorter = a.len().min(b.len());
        if (shorter as i64) < self.min_overlap_ms {
            return Err(AlignmentError::InsufficientOverlap {
                overlap_ms: shorter as i64,
                required_ms: self.min_overlap_ms,
            });
        }

        let correlation = cross_correlate(&a, &b);
        let n = correlation.len() as i64;

        // delay = how much later `other` started than the anchor, in ms
        let max_lag = self.max_lag_ms;
        let mut best: Option<(i64, f64)> = None;
        for delay in -max_lag..=max_lag {
            let overlap = overlap_len(a.len(), b.len(), delay);
            if overlap < self.min_overlap_ms {
                continue;
            }
            let index = delay.rem_euclid(n) as usize;
            let value = correlation[index];
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((delay, value));
            }
        }

        let (delay, _) = best.ok_or(AlignmentError::InsufficientOverlap {
            overlap_ms: overlap_len(a.len(), b.len(), 0),
            required_ms: self.min_overlap_ms,
        })?;

        let overlap = overlap_len(a.len(), b.len(), delay);
        let r = pearson_at(&a, &b, delay);
        let confidence = (r.max(0.0) * overlap as f64 / shorter as f64).clamp(0.0, 1.0);

        Ok(Alignment {
            offset_ms: -delay,
            confidence,
        })
    }
}

/// Bring a track to `target_rate`; tracks already at that rate are borrowed
fn resample_to<'a>(
    track: &'a AudioTrack,
    target_rate: u32,
    label: &str,
) -> Result<Cow<'a, AudioTrack>, AlignmentError> {
    if track.sample_rate == target_rate || track.sample_rate == 0 || track.samples.is_empty() {
        return Ok(Cow::Borrowed(track));
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / track.sample_rate as f64;

    // Single pass over the whole track
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, track.samples.len(), 1)
        .map_err(|e| AlignmentError::Decode(format!("{} resampler: {}", label, e)))?;
    let delay = resampler.output_delay();

    let input = vec![track.samples.as_slice()];
    let mut output = resampler
        .process(&input[..], None)
        .map_err(|e| AlignmentError::Decode(format!("{} resampling: {}", label, e)))?;
    let mut samples = output.pop().unwrap_or_default();

    // Drop the filter delay so sample 0 still lines up with the track start
    samples.drain(..delay.min(samples.len()));

    debug!(
        track = label,
        from_hz = track.sample_rate,
        to_hz = target_rate,
        frames = samples.len(),
        "Resampled alignment audio"
    );

    Ok(Cow::Owned(AudioTrack {
        sample_rate: target_rate,
        samples,
    }))
}

/// Mean-removed RMS per millisecond
///
/// Block `i` covers samples `[i·rate/1000, (i+1)·rate/1000)`, so block edges
/// fall on exact millisecond boundaries for any sample rate.
fn envelope(track: &AudioTrack, label: &str) -> Result<Vec<f64>, AlignmentError> {
    if track.sample_rate == 0 || track.samples.is_empty() {
        return Err(AlignmentError::MissingAudio(format!("{} track is empty", label)));
    }

    let rate = track.sample_rate as usize;
    let len = track.samples.len();
    let blocks = (len * 1000 / rate).max(1);

    let mut env: Vec<f64> = (0..blocks)
        .map(|ms| {
            let start = (ms * rate / 1000).min(len - 1);
            let end = ((ms + 1) * rate / 1000).clamp(start + 1, len);
            let chunk = &track.samples[start..end];
            let energy: f64 = chunk.iter().map(|s| (*s as f64) * (*s as f64)).sum();
            (energy / chunk.len() as f64).sqrt()
        })
        .collect();

    let mean = env.iter().sum::<f64>() / env.len() as f64;
    env.iter_mut().for_each(|v| *v -= mean);

    let variance = env.iter().map(|v| v * v).sum::<f64>() / env.len() as f64;
    if variance < 1e-12 {
        return Err(AlignmentError::SilentTrack(format!("{} track has no dynamics", label)));
    }

    Ok(env)
}

/// `out[k] = Σ a[j + k] · b[j]`, circular over the padded length; negative k wraps
fn cross_correlate(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = (a.len() + b.len()).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let pad = |x: &[f64]| -> Vec<Complex<f64>> {
        let mut buf: Vec<Complex<f64>> = x.iter().map(|v| Complex::new(*v, 0.0)).collect();
        buf.resize(n, Complex::new(0.0, 0.0));
        buf
    };

    let mut fa = pad(a);
    let mut fb = pad(b);
    forward.process(&mut fa);
    forward.process(&mut fb);

    let mut product: Vec<Complex<f64>> = fa
        .iter()
        .zip(fb.iter())
        .map(|(x, y)| x * y.conj())
        .collect();
    inverse.process(&mut product);

    let scale = n as f64;
    product.iter().map(|c| c.re / scale).collect()
}

/// Shared length when `b[j]` lines up with `a[j + delay]`
fn overlap_len(a_len: usize, b_len: usize, delay: i64) -> i64 {
    let start = (-delay).max(0);
    let end = (b_len as i64).min(a_len as i64 - delay);
    (end - start).max(0)
}

fn pearson_at(a: &[f64], b: &[f64], delay: i64) -> f64 {
    let start = (-delay).max(0);
    let end = (b.len() as i64).min(a.len() as i64 - delay);
    if end <= start {
        return 0.0;
    }

    let pairs: Vec<(f64, f64)> = (start..end)
        .map(|j| (a[(j + delay) as usize], b[j as usize]))
        .collect();
    let count = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / count;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / count;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
