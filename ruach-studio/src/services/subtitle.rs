//! SRT and WebVTT rendering

use crate::models::{Segment, SubtitleFormat};

/// One subtitle cue on the target angle's timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start_ms: i64,
    pub end_ms: i64,
    pub speaker: Option<String>,
    pub text: String,
}

/// Shift segments by `shift_ms` onto another angle's timeline
///
/// Cues that end at or before zero are dropped; starts are clamped to zero.
pub fn shift_segments(segments: &[Segment], shift_ms: i64) -> Vec<Cue> {
    segments
        .iter()
        .filter_map(|segment| {
            let end_ms = segment.end_ms + shift_ms;
            if end_ms <= 0 {
                return None;
            }
            Some(Cue {
                start_ms: (segment.start_ms + shift_ms).max(0),
                end_ms,
                speaker: segment.speaker.clone(),
                text: segment.text.clone(),
            })
        })
        .collect()
}

pub fn render(cues: &[Cue], format: SubtitleFormat, include_speakers: bool) -> String {
    match format {
        SubtitleFormat::Srt => to_srt(cues, include_speakers),
        SubtitleFormat::Vtt => to_vtt(cues, include_speakers),
    }
}

pub fn to_srt(cues: &[Cue], include_speakers: bool) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms)
        ));
        out.push_str(&cue_text(cue, include_speakers));
        out.push_str("\n\n");
    }
    out
}

pub fn to_vtt(cues: &[Cue], include_speakers: bool) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        out.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(cue.start_ms),
            format_vtt_time(cue.end_ms)
        ));
        out.push_str(&cue_text(cue, include_speakers));
        out.push_str("\n\n");
    }
    out
}

fn cue_text(cue: &Cue, include_speakers: bool) -> String {
    match (&cue.speaker, include_speakers) {
        (Some(speaker), true) => format!("{}: {}", speaker, cue.text),
        _ => cue.text.clone(),
    }
}

fn split_ms(ms: i64) -> (i64, i64, i64, i64) {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    (hours, minutes, seconds, millis)
}

/// `HH:MM:SS,mmm`
fn format_srt_time(ms: i64) -> String {
    let (hours, minutes, seconds, millis) = split_ms(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// `HH:MM:SS.mmm`
fn format_vtt_time(ms: i64) -> String {
    let (hours, minutes, seconds, millis) = split_ms(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
