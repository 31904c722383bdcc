//! Data types for the streaming transcription engine.
//!
//! Positions are absolute sample offsets from session start; durations in
//! seconds or milliseconds appear only at the event surface.

use serde::Serialize;

/// A bounded audio span submitted once for transcription.
///
/// Owned by the scheduler/coordinator until its transcription resolves or the
/// chunk is superseded by a reprocessing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChunk {
    /// Monotonic per-session id.
    pub id: u64,
    /// Absolute start offset (inclusive).
    pub start: u64,
    /// Absolute end offset (exclusive).
    pub end: u64,
    /// Cut by the periodic timeout while speech continued, as opposed to a
    /// final cut at speech end.
    pub is_timeout: bool,
    /// Ids of previously submitted chunks this one supersedes.
    pub replaces: Vec<u64>,
}

impl PendingChunk {
    /// Returns the duration of this chunk in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u64 {
        (self.end - self.start) * 1000 / sample_rate as u64
    }
}

/// A committed transcript span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    pub id: u64,
    /// Absolute start offset (inclusive).
    pub start: u64,
    /// Absolute end offset (exclusive).
    pub end: u64,
    pub text: String,
    /// True when this segment came from a reprocessing pass that replaced
    /// earlier timeout-chunk segments.
    pub is_reprocessed: bool,
    /// Ids of the segments this one replaced (empty for ordinary chunks).
    pub replaces: Vec<u64>,
}

impl TranscriptSegment {
    /// Returns the duration of this segment in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u64 {
        (self.end - self.start) * 1000 / sample_rate as u64
    }

    /// Start position in seconds.
    pub fn start_secs(&self, sample_rate: u32) -> f64 {
        self.start as f64 / sample_rate as f64
    }

    /// End position in seconds.
    pub fn end_secs(&self, sample_rate: u32) -> f64 {
        self.end as f64 / sample_rate as f64
    }
}

/// Per-session notifications delivered over the session event channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A confirmed silent-to-speaking transition.
    SpeechStarted { at_secs: f64 },
    /// A confirmed speaking-to-silent transition.
    SpeechEnded { at_secs: f64, duration_ms: u64 },
    /// A segment was committed to the timeline (possibly replacing others).
    Transcript(TranscriptSegment),
    /// A chunk exhausted its transcription retries and was committed empty.
    SttWarning { chunk_id: u64, message: String },
    /// The transcription backend failed permanently; no further chunks will
    /// be submitted until the session is reset.
    SttFatal { message: String },
}

/// Lightweight session counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionStats {
    pub is_running: bool,
    /// Total audio ingested since session creation, in seconds.
    pub ingested_secs: f64,
    /// Chunks handed to the transcription coordinator.
    pub chunks_submitted: u64,
    /// Segments currently committed in the timeline.
    pub segments_committed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_chunk_duration() {
        let chunk = PendingChunk {
            id: 1,
            start: 16000,
            end: 64000,
            is_timeout: true,
            replaces: Vec::new(),
        };
        assert_eq!(chunk.duration_ms(16000), 3000);
    }

    #[test]
    fn test_segment_time_helpers() {
        let segment = TranscriptSegment {
            id: 7,
            start: 48000,
            end: 96000,
            text: "hello".to_string(),
            is_reprocessed: false,
            replaces: Vec::new(),
        };
        assert_eq!(segment.start_secs(16000), 3.0);
        assert_eq!(segment.end_secs(16000), 6.0);
        assert_eq!(segment.duration_ms(16000), 3000);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = SessionEvent::Transcript(TranscriptSegment {
            id: 3,
            start: 0,
            end: 16000,
            text: "hi".to_string(),
            is_reprocessed: true,
            replaces: vec![1, 2],
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"transcript"#));
        assert!(json.contains(r#""replaces":[1,2]"#));
        assert!(json.contains(r#""is_reprocessed":true"#));
    }
}
