//! Speech-to-text providers
//!
//! Providers return raw segments on the source angle's timeline; ordering
//! and overlap cleanup happen in the transcript generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ProviderKind, TranscriptionConfig};
use crate::models::WordTiming;

const USER_AGENT: &str = concat!("ruach-studio/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {0}: {1}")]
    Provider(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRequest {
    pub session_id: Uuid,
    pub angle: String,
    /// Audio rendition location of the source angle
    pub audio_location: Option<String>,
    pub duration_ms: Option<i64>,
    pub language: Option<String>,
    pub diarization: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSegment {
    #[serde(default)]
    pub speaker: Option<String>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    #[serde(default)]
    pub provider_job_id: Option<String>,
    pub segments: Vec<ProviderSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Provider label stored on the transcript
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionOutput, TranscriptionError>;
}

/// Build the provider selected in configuration
pub fn provider_from_config(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn TranscriptionProvider>, TranscriptionError> {
    let provider: Arc<dyn TranscriptionProvider> = match config.provider {
        ProviderKind::Mock => Arc::new(MockTranscriptionProvider::default()),
        ProviderKind::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                TranscriptionError::NotConfigured("[transcription] endpoint is required".into())
            })?;
            Arc::new(HttpTranscriptionProvider::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)
        }
    };
    Ok(provider)
}

/// Remote service accepting a JSON job and answering with segments
pub struct HttpTranscriptionProvider {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranscriptionProvider {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl TranscriptionProvider for HttpTranscriptionProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        tracing::debug!(
            session_id = %request.session_id,
            angle = %request.angle,
            endpoint = %self.endpoint,
            "Submitting transcription request"
        );

        let mut builder = self.http_client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Provider(status.as_u16(), error_text));
        }

        let output: TranscriptionOutput = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Parse(e.to_string()))?;

        tracing::info!(
            session_id = %request.session_id,
            segments = output.segments.len(),
            provider_job_id = output.provider_job_id.as_deref().unwrap_or(""),
            "Transcription received"
        );

        Ok(output)
    }
}

const MOCK_LINES: &[&str] = &[
    "Good morning and welcome to this recording session.",
    "Thank you for having me, it is good to be here.",
    "Let us begin with a short reading before the discussion.",
    "That passage has always meant a great deal to me.",
    "We will take a few questions from the room afterwards.",
    "Before we close, a word of thanks to everyone who helped.",
];

/// Deterministic two-speaker transcript for development and tests
#[derive(Debug, Clone)]
pub struct MockTranscriptionProvider {
    segment_ms: i64,
    gap_ms: i64,
}

impl Default for MockTranscriptionProvider {
    fn default() -> Self {
        Self {
            segment_ms: 4_500,
            gap_ms: 500,
        }
    }
}

#[async_trait]
impl TranscriptionProvider for MockTranscriptionProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        let duration_ms = request.duration_ms.unwrap_or(60_000).max(1);
        let step = self.segment_ms + self.gap_ms;

        let mut segments = Vec::new();
        let mut start_ms = 0;
        let mut index = 0usize;
        while start_ms < duration_ms {
            let end_ms = (start_ms + self.segment_ms).min(duration_ms);
            let text = MOCK_LINES[index % MOCK_LINES.len()];
            let speaker = if request.diarization {
                Some(if index % 2 == 0 { "Speaker A" } else { "Speaker B" }.to_string())
            } else {
                None
            };

            segments.push(ProviderSegment {
                speaker,
                start_ms,
                end_ms,
                text: text.to_string(),
                confidence: Some(0.92),
                words: spread_words(text, start_ms, end_ms),
            });

            start_ms += step;
            index += 1;
        }

        Ok(TranscriptionOutput {
            provider_job_id: Some(format!("mock-{}", request.session_id)),
            segments,
            language: request.language.clone(),
        })
    }
}

/// Evenly spaced word timings across a segment
fn spread_words(text: &str, start_ms: i64, end_ms: i64) -> Vec<WordTiming> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let each = (end_ms - start_ms) / words.len() as i64;

    words
        .iter()
        .enumerate()
        .map(|(i, word)| WordTiming {
            text: word.to_string(),
            start_ms: start_ms + each * i as i64,
            end_ms: start_ms + each * (i as i64 + 1),
            confidence: Some(0.92),
        })
        .collect()
}
