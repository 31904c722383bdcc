//! Whisper-compatible HTTP transcription client.
//!
//! Talks to hosted batch-transcription endpoints (Fireworks, OpenAI-style):
//! multipart WAV upload with model/temperature/prompt fields, bearer auth,
//! JSON response with a `text` field and an optional `segments` fallback.

use crate::audio::wav::encode_wav;
use crate::stt::client::{SttClient, SttError, SttResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Instant;

/// Configuration for the HTTP transcription backend.
#[derive(Debug, Clone)]
pub struct WhisperHttpConfig {
    /// Transcription endpoint URL.
    pub api_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Decoding temperature.
    pub temperature: f32,
}

impl Default for WhisperHttpConfig {
    fn default() -> Self {
        Self {
            api_url: "https://audio-prod.us-virginia-1.direct.fireworks.ai/v1/audio/transcriptions"
                .to_string(),
            api_key: String::new(),
            model: "whisper-v3".to_string(),
            temperature: 0.0,
        }
    }
}

impl WhisperHttpConfig {
    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMSCRIBE_STT_URL → api_url
    /// - STREAMSCRIBE_STT_API_KEY → api_key
    /// - STREAMSCRIBE_STT_MODEL → model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("STREAMSCRIBE_STT_URL") {
            if !url.is_empty() {
                self.api_url = url;
            }
        }
        if let Ok(key) = std::env::var("STREAMSCRIBE_STT_API_KEY") {
            if !key.is_empty() {
                self.api_key = key;
            }
        }
        if let Ok(model) = std::env::var("STREAMSCRIBE_STT_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<SegmentBody>,
}

#[derive(Debug, Deserialize)]
struct SegmentBody {
    #[serde(default)]
    text: String,
}

impl TranscriptionBody {
    /// The top-level `text` field, falling back to joining segment texts.
    fn into_text(self) -> String {
        if !self.text.is_empty() {
            return self.text.trim().to_string();
        }
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Maps an HTTP status to the transcription error taxonomy.
fn map_status(status: StatusCode) -> SttError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SttError::Auth(format!("status {}", status.as_u16()))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            SttError::Transient(format!("status {}", status.as_u16()))
        }
        s if s.is_server_error() => SttError::Transient(format!("status {}", s.as_u16())),
        s => SttError::Permanent(format!("status {}", s.as_u16())),
    }
}

fn map_transport(e: reqwest::Error) -> SttError {
    // Connection resets, DNS hiccups and socket timeouts are all retryable.
    SttError::Transient(e.to_string())
}

/// HTTP transcription client.
pub struct WhisperHttpClient {
    config: WhisperHttpConfig,
    http: reqwest::Client,
}

impl WhisperHttpClient {
    pub fn new(config: WhisperHttpConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SttClient for WhisperHttpClient {
    async fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        prompt: &str,
    ) -> Result<SttResponse, SttError> {
        let started = Instant::now();

        let wav = encode_wav(sample_rate, audio)
            .map_err(|e| SttError::Permanent(format!("wav encoding failed: {}", e)))?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Permanent(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.config.model.clone())
            .text("temperature", format!("{}", self.config.temperature))
            .text("response_format", "json");
        if !prompt.is_empty() {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }

        let body: TranscriptionBody = response
            .json()
            .await
            .map_err(|e| SttError::Transient(format!("malformed response: {}", e)))?;

        Ok(SttResponse {
            text: body.into_text(),
            confidence: None,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}
