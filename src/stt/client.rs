//! Speech-to-text client trait and test double.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Result of one transcription call.
#[derive(Debug, Clone, PartialEq)]
pub struct SttResponse {
    /// Transcribed text (may be empty for silent audio).
    pub text: String,
    /// Backend confidence, if reported.
    pub confidence: Option<f32>,
    /// Backend-reported or measured processing time.
    pub processing_time_ms: u64,
}

impl SttResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            processing_time_ms: 0,
        }
    }
}

/// Transcription failure taxonomy.
///
/// Transient failures are retried; auth and permanent failures halt the
/// session's coordinator until it is reconfigured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SttError {
    #[error("transient transcription failure: {0}")]
    Transient(String),

    #[error("transcription service rejected credentials: {0}")]
    Auth(String),

    #[error("permanent transcription failure: {0}")]
    Permanent(String),
}

impl SttError {
    /// True when retrying cannot help and the session must stop submitting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SttError::Auth(_) | SttError::Permanent(_))
    }
}

/// External transcription boundary.
///
/// Implementations must support concurrent calls per session: consecutive
/// timeout chunks are transcribed in parallel.
#[async_trait]
pub trait SttClient: Send + Sync {
    /// Transcribes mono 16-bit PCM audio.
    ///
    /// # Arguments
    /// * `audio` - samples at `sample_rate`
    /// * `sample_rate` - sample rate in Hz
    /// * `prompt` - prior transcript text for recognition continuity; may be
    ///   empty
    async fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        prompt: &str,
    ) -> Result<SttResponse, SttError>;
}

/// One scripted outcome for [`MockSttClient`].
#[derive(Debug, Clone)]
enum MockOutcome {
    Respond { text: String, delay: Option<Duration> },
    Transient(String),
    Fatal(String),
}

/// A call observed by [`MockSttClient`], for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub samples: usize,
    pub sample_rate: u32,
}

/// Mock transcription client for testing.
///
/// Outcomes are consumed in call order; once the script is exhausted every
/// call returns the default response.
pub struct MockSttClient {
    script: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<RecordedCall>>,
    default_text: String,
}

impl MockSttClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            default_text: "mock transcription".to_string(),
        }
    }

    /// Sets the response used once the script is exhausted.
    pub fn with_default_response(mut self, text: &str) -> Self {
        self.default_text = text.to_string();
        self
    }

    /// Queues a successful response.
    pub fn with_response(self, text: &str) -> Self {
        self.push(MockOutcome::Respond {
            text: text.to_string(),
            delay: None,
        });
        self
    }

    /// Queues a successful response delivered after `delay`.
    pub fn with_delayed_response(self, text: &str, delay: Duration) -> Self {
        self.push(MockOutcome::Respond {
            text: text.to_string(),
            delay: Some(delay),
        });
        self
    }

    /// Queues `count` transient failures.
    pub fn with_transient_failures(self, count: usize) -> Self {
        for _ in 0..count {
            self.push(MockOutcome::Transient("simulated outage".to_string()));
        }
        self
    }

    /// Queues a fatal (auth) failure.
    pub fn with_fatal_failure(self, message: &str) -> Self {
        self.push(MockOutcome::Fatal(message.to_string()));
        self
    }

    fn push(&self, outcome: MockOutcome) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Calls observed so far, in submission-completion order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockSttClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SttClient for MockSttClient {
    async fn transcribe(
        &self,
        audio: &[i16],
        sample_rate: u32,
        prompt: &str,
    ) -> Result<SttResponse, SttError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                prompt: prompt.to_string(),
                samples: audio.len(),
                sample_rate,
            });

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match outcome {
            Some(MockOutcome::Respond { text, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(SttResponse {
                    text,
                    confidence: Some(0.9),
                    processing_time_ms: 5,
                })
            }
            Some(MockOutcome::Transient(message)) => Err(SttError::Transient(message)),
            Some(MockOutcome::Fatal(message)) => Err(SttError::Auth(message)),
            None => Ok(SttResponse {
                text: self.default_text.clone(),
                confidence: Some(0.9),
                processing_time_ms: 5,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_scripted_responses_in_order() {
        let client = MockSttClient::new()
            .with_response("first")
            .with_response("second");

        let audio = vec![0i16; 100];
        assert_eq!(
            client.transcribe(&audio, 16000, "").await.unwrap().text,
            "first"
        );
        assert_eq!(
            client.transcribe(&audio, 16000, "").await.unwrap().text,
            "second"
        );
        // Script exhausted: default response.
        assert_eq!(
            client.transcribe(&audio, 16000, "").await.unwrap().text,
            "mock transcription"
        );
    }

    #[tokio::test]
    async fn test_mock_transient_failure() {
        let client = MockSttClient::new().with_transient_failures(1);

        let err = client.transcribe(&[0i16; 10], 16000, "").await.unwrap_err();
        assert!(matches!(err, SttError::Transient(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_mock_fatal_failure() {
        let client = MockSttClient::new().with_fatal_failure("bad key");

        let err = client.transcribe(&[0i16; 10], 16000, "").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let client = MockSttClient::new();
        client.transcribe(&[0i16; 42], 16000, "previous text").await.unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "previous text");
        assert_eq!(calls[0].samples, 42);
        assert_eq!(calls[0].sample_rate, 16000);
    }

    #[test]
    fn test_error_fatality() {
        assert!(!SttError::Transient("x".into()).is_fatal());
        assert!(SttError::Auth("x".into()).is_fatal());
        assert!(SttError::Permanent("x".into()).is_fatal());
    }

    #[test]
    fn test_client_trait_is_object_safe() {
        let client: Box<dyn SttClient> = Box::new(MockSttClient::new());
        let _ = &client;
    }
}
