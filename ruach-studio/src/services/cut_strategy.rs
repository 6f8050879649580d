//! Program-track cut strategies
//!
//! A strategy turns transcript segments on the anchor timeline into a list of
//! camera switches; [`build_program`] turns those into contiguous shots
//! spanning `[0, duration_ms]`.

use std::collections::BTreeMap;

use crate::config::EdlConfig;
use crate::error::{StudioError, StudioResult};
use crate::models::ProgramEntry;

/// Transcript segment already shifted onto the anchor timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    pub speaker: Option<String>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CutStrategyConfig {
    pub min_shot_ms: i64,
    pub max_shot_ms: i64,
    pub switch_cooldown_ms: i64,
    pub silence_gap_ms: i64,
    pub fixed_interval_ms: i64,
    pub speaker_angles: BTreeMap<String, String>,
}

impl From<&EdlConfig> for CutStrategyConfig {
    fn from(config: &EdlConfig) -> Self {
        Self {
            min_shot_ms: config.min_shot_ms,
            max_shot_ms: config.max_shot_ms,
            switch_cooldown_ms: config.switch_cooldown_ms,
            silence_gap_ms: config.silence_gap_ms,
            fixed_interval_ms: config.fixed_interval_ms,
            speaker_angles: config.speaker_angles.clone(),
        }
    }
}

pub trait CutStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `angles` are the participating angles in registration order, never empty
    fn cut(&self, segments: &[TimedSegment], angles: &[String], duration_ms: i64) -> Vec<ProgramEntry>;
}

/// Look up a strategy by its configured name
pub fn strategy_for(name: &str, config: CutStrategyConfig) -> StudioResult<Box<dyn CutStrategy>> {
    match name {
        "speaker-change" => Ok(Box::new(SpeakerChange { config })),
        "silence-gap" => Ok(Box::new(SilenceGap { config })),
        "fixed-interval" => Ok(Box::new(FixedInterval { config })),
        other => Err(StudioError::Validation(format!("unknown cut strategy '{}'", other))),
    }
}

/// Switch log shared by the strategies
struct Switcher<'a> {
    angles: &'a [String],
    cuts: Vec<(i64, String)>,
    current: usize,
    shot_start: i64,
}

impl<'a> Switcher<'a> {
    fn new(angles: &'a [String], first: usize) -> Self {
        Self {
            angles,
            cuts: vec![(0, angles[first].clone())],
            current: first,
            shot_start: 0,
        }
    }

    fn shot_length(&self, at_ms: i64) -> i64 {
        at_ms - self.shot_start
    }

    fn switch_to(&mut self, at_ms: i64, angle: usize) {
        if angle == self.current || at_ms <= self.shot_start {
            return;
        }
        self.cuts.push((at_ms, self.angles[angle].clone()));
        self.current = angle;
        self.shot_start = at_ms;
    }

    fn rotate(&mut self, at_ms: i64) {
        let next = (self.current + 1) % self.angles.len();
        self.switch_to(at_ms, next);
    }

    /// Force rotations so no shot before `at_ms` exceeds `max_shot_ms`
    fn enforce_max(&mut self, at_ms: i64, max_shot_ms: i64) {
        if self.angles.len() < 2 || max_shot_ms <= 0 {
            return;
        }
        while self.shot_length(at_ms) > max_shot_ms {
            let cut_at = self.shot_start + max_shot_ms;
            self.rotate(cut_at);
        }
    }

    fn finish(self, duration_ms: i64) -> Vec<ProgramEntry> {
        build_program(self.cuts, duration_ms)
    }
}

/// Turn `(time, angle)` switches into contiguous shots over `[0, duration_ms]`,
/// merging neighbours on the same angle
pub fn build_program(mut cuts: Vec<(i64, String)>, duration_ms: i64) -> Vec<ProgramEntry> {
    if duration_ms <= 0 || cuts.is_empty() {
        return Vec::new();
    }
    cuts.sort_by_key(|(at, _)| *at);
    cuts.retain(|(at, _)| *at < duration_ms);
    if let Some(first) = cuts.first_mut() {
        first.0 = 0;
    }

    let mut program: Vec<ProgramEntry> = Vec::with_capacity(cuts.len());
    for (i, (start_ms, angle)) in cuts.iter().enumerate() {
        let end_ms = cuts.get(i + 1).map(|(at, _)| *at).unwrap_or(duration_ms);
        if end_ms <= *start_ms {
            continue;
        }
        match program.last_mut() {
            Some(last) if last.angle == *angle => last.end_ms = end_ms,
            _ => program.push(ProgramEntry {
                angle: angle.clone(),
                start_ms: *start_ms,
                end_ms,
            }),
        }
    }
    program
}

/// Follow the active speaker, within minimum/maximum shot lengths and a cooldown
pub struct SpeakerChange {
    config: CutStrategyConfig,
}

impl SpeakerChange {
    /// Explicit assignments first, remaining speakers round-robin in order of appearance
    fn speaker_map(&self, segments: &[TimedSegment], angles: &[String]) -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        for (speaker, angle) in &self.config.speaker_angles {
            if let Some(index) = angles.iter().position(|a| a == angle) {
                map.insert(speaker.clone(), index);
            }
        }

        let mut next = 0usize;
        for speaker in segments.iter().filter_map(|s| s.speaker.as_ref()) {
            if !map.contains_key(speaker) {
                map.insert(speaker.clone(), next % angles.len());
                next += 1;
            }
        }
        map
    }
}

impl CutStrategy for SpeakerChange {
    fn name(&self) -> &str {
        "speaker-change"
    }

    fn cut(&self, segments: &[TimedSegment], angles: &[String], duration_ms: i64) -> Vec<ProgramEntry> {
        let speakers = self.speaker_map(segments, angles);
        let angle_of = |segment: &TimedSegment| {
            segment
                .speaker
                .as_ref()
                .and_then(|s| speakers.get(s).copied())
        };

        let first = segments.iter().find_map(angle_of).unwrap_or(0);
        let mut switcher = Switcher::new(angles, first);
        let hold = self.config.min_shot_ms.max(self.config.switch_cooldown_ms);

        for segment in segments {
            switcher.enforce_max(segment.start_ms, self.config.max_shot_ms);
            if let Some(wanted) = angle_of(segment) {
                if wanted != switcher.current && switcher.shot_length(segment.start_ms) >= hold {
                    switcher.switch_to(segment.start_ms, wanted);
                }
            }
        }
        switcher.enforce_max(duration_ms, self.config.max_shot_ms);

        switcher.finish(duration_ms)
    }
}

/// Rotate angles at pauses in speech
pub struct SilenceGap {
    config: CutStrategyConfig,
}

impl CutStrategy for SilenceGap {
    fn name(&self) -> &str {
        "silence-gap"
    }

    fn cut(&self, segments: &[TimedSegment], angles: &[String], duration_ms: i64) -> Vec<ProgramEntry> {
        let mut switcher = Switcher::new(angles, 0);
        let mut previous_end: Option<i64> = None;

        for segment in segments {
            switcher.enforce_max(segment.start_ms, self.config.max_shot_ms);
            if let Some(end) = previous_end {
                let gap = segment.start_ms - end;
                if gap >= self.config.silence_gap_ms
                    && switcher.shot_length(segment.start_ms) >= self.config.min_shot_ms
                {
                    switcher.rotate(segment.start_ms);
                }
            }
            previous_end = Some(segment.end_ms);
        }
        switcher.enforce_max(duration_ms, self.config.max_shot_ms);

        switcher.finish(duration_ms)
    }
}

/// Rotate angles on a fixed cadence, ignoring the transcript
pub struct FixedInterval {
    config: CutStrategyConfig,
}

impl CutStrategy for FixedInterval {
    fn name(&self) -> &str {
        "fixed-interval"
    }

    fn cut(&self, _segments: &[TimedSegment], angles: &[String], duration_ms: i64) -> Vec<ProgramEntry> {
        let mut switcher = Switcher::new(angles, 0);
        let interval = self.config.fixed_interval_ms.max(1);

        let mut at = interval;
        while at < duration_ms {
            switcher.rotate(at);
            at += interval;
        }

        switcher.finish(duration_ms)
    }
}
