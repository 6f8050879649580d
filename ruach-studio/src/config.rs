//! Configuration for ruach-studio
//!
//! Priority: command line (clap, with env fallbacks) → TOML file
//! (`<root>/ruach-studio.toml`) → compiled defaults. Sync thresholds can
//! additionally be overridden at runtime through the settings table.

use ruach_common::config::load_toml_file;
use ruach_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::models::SyncThresholds;

pub const MODULE_NAME: &str = "ruach-studio";

/// Complete service configuration as read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub transcription: TranscriptionConfig,
    pub edl: EdlConfig,
    pub rate_limits: RateLimitConfig,
}

impl StudioConfig {
    /// Load `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        let config: StudioConfig = load_toml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sync
            .thresholds()
            .validate()
            .map_err(|e| Error::Config(format!("[sync] {}", e)))?;

        if self.edl.min_shot_ms <= 0 || self.edl.max_shot_ms < self.edl.min_shot_ms {
            return Err(Error::Config(
                "[edl] require 0 < min_shot_ms <= max_shot_ms".to_string(),
            ));
        }
        if self.edl.fixed_interval_ms <= 0 {
            return Err(Error::Config("[edl] fixed_interval_ms must be positive".to_string()));
        }

        for (class, budget) in self.rate_limits.budgets() {
            if budget.limit == 0 || budget.window_secs == 0 {
                return Err(Error::Config(format!(
                    "[rate_limits.{}] limit and window_secs must be positive",
                    class
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Broadcast buffer per SSE subscriber
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5740,
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub review_threshold: f64,
    pub looks_good_threshold: f64,
    /// Approve automatically when every angle reaches `looks_good_threshold`
    pub auto_approve: bool,
    /// Largest offset searched in either direction
    pub max_lag_ms: i64,
    /// Minimum shared audio for a usable alignment
    pub min_overlap_ms: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let thresholds = SyncThresholds::default();
        Self {
            review_threshold: thresholds.review_threshold,
            looks_good_threshold: thresholds.looks_good_threshold,
            auto_approve: false,
            max_lag_ms: 30_000,
            min_overlap_ms: 5_000,
        }
    }
}

impl SyncConfig {
    pub fn thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            review_threshold: self.review_threshold,
            looks_good_threshold: self.looks_good_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deterministic local transcripts for development
    Mock,
    /// Remote speech-to-text service over HTTP
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: ProviderKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub diarization: bool,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            endpoint: None,
            api_key: None,
            language: Some("en".to_string()),
            diarization: true,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdlConfig {
    /// `speaker-change`, `silence-gap` or `fixed-interval`
    pub strategy: String,
    pub min_shot_ms: i64,
    pub max_shot_ms: i64,
    pub switch_cooldown_ms: i64,
    /// Silence that triggers a cut in the `silence-gap` strategy
    pub silence_gap_ms: i64,
    pub fixed_interval_ms: i64,
    /// Silence that opens a new chapter
    pub chapter_gap_ms: i64,
    /// Longest chapter before one is forced at the next segment
    pub chapter_max_ms: i64,
    /// Explicit speaker label → angle assignments
    pub speaker_angles: BTreeMap<String, String>,
}

impl Default for EdlConfig {
    fn default() -> Self {
        Self {
            strategy: "speaker-change".to_string(),
            min_shot_ms: 2_000,
            max_shot_ms: 15_000,
            switch_cooldown_ms: 1_500,
            silence_gap_ms: 1_200,
            fixed_interval_ms: 8_000,
            chapter_gap_ms: 5_000,
            chapter_max_ms: 7 * 60 * 1_000,
            speaker_angles: BTreeMap::new(),
        }
    }
}

/// Budget of `limit` calls per `window_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateBudget {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub create: RateBudget,
    pub status: RateBudget,
    pub cancel: RateBudget,
    pub list: RateBudget,
    /// How often expired counters are swept
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            create: RateBudget { limit: 10, window_secs: 3600 },
            status: RateBudget { limit: 120, window_secs: 60 },
            cancel: RateBudget { limit: 20, window_secs: 3600 },
            list: RateBudget { limit: 60, window_secs: 60 },
            sweep_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn budgets(&self) -> [(&'static str, RateBudget); 4] {
        [
            ("create", self.create),
            ("status", self.status),
            ("cancel", self.cancel),
            ("list", self.list),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StudioConfig::load(&dir.path().join("ruach-studio.toml")).unwrap();

        assert_eq!(config.server.port, 5740);
        assert_eq!(config.edl.strategy, "speaker-change");
        assert_eq!(config.transcription.provider, ProviderKind::Mock);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ruach-studio.toml");
        std::fs::write(
            &path,
            r#"
            [sync]
            review_threshold = 0.4
            auto_approve = true

            [rate_limits.create]
            limit = 3
            window_secs = 10

            [edl.speaker_angles]
            "Speaker A" = "B"
            "#,
        )
        .unwrap();

        let config = StudioConfig::load(&path).unwrap();
        assert_eq!(config.sync.review_threshold, 0.4);
        assert_eq!(config.sync.looks_good_threshold, 0.8);
        assert!(config.sync.auto_approve);
        assert_eq!(config.rate_limits.create, RateBudget { limit: 3, window_secs: 10 });
        assert_eq!(config.rate_limits.status.limit, 120);
        assert_eq!(config.edl.speaker_angles["Speaker A"], "B");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = StudioConfig::default();
        config.sync.review_threshold = 0.95;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = StudioConfig::default();
        config.rate_limits.cancel.limit = 0;
        assert!(config.validate().is_err());
    }
}
