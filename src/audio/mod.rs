//! Audio ingest: sample buffering and voice-activity tracking.

pub mod buffer;
pub mod vad;
pub mod wav;

pub use buffer::IngestBuffer;
pub use vad::{
    Classification, RmsClassifier, SpeechClassifier, SpeechEvent, SpeechState, TrackerConfig,
    VoiceActivityTracker, calculate_rms,
};
