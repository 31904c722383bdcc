//! streamscribe - real-time speech segmentation and incremental transcription.
//!
//! Cuts a continuous, voice-activity-annotated audio stream into bounded
//! chunks for batch speech-to-text calls, re-transcribes the trailing
//! lookback window once a speech span ends to fix boundary errors, chains
//! prompt context across chunks, and reconciles out-of-order asynchronous
//! results into an ordered transcript timeline.
//!
//! The voice-activity classifier and the speech-to-text engine are external
//! boundaries ([`SpeechClassifier`], [`SttClient`]); everything in between is
//! the per-session engine exposed through [`StreamingSession`].

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod stt;
pub mod streaming;

// Core boundaries (classify → segment → transcribe)
pub use audio::vad::{
    Classification, RmsClassifier, SpeechClassifier, SpeechEvent, SpeechState,
    VoiceActivityTracker,
};
pub use stt::client::{MockSttClient, SttClient, SttError, SttResponse};

// Engine
pub use streaming::session::StreamingSession;
pub use streaming::timeline::ResultTimeline;
pub use streaming::types::{PendingChunk, SessionEvent, SessionStats, TranscriptSegment};

// Error handling
pub use error::{Result, StreamscribeError};

// Config
pub use config::Config;
