//! Default configuration constants for streamscribe.
//!
//! Shared across configuration types so the library and its tests agree on
//! one set of baseline values.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default classifier hop size in samples (16 ms at 16 kHz).
///
/// The voice-activity classifier is invoked once per hop; ingested frames of
/// any size are re-framed into hops internally.
pub const HOP_SIZE: usize = 256;

/// Default RMS threshold for the built-in energy classifier (0.0 to 1.0).
pub const VAD_THRESHOLD: f32 = 0.02;

/// Default duration of continuous silence required to confirm the end of a
/// speech span, in milliseconds.
pub const SILENCE_CONFIRM_MS: u64 = 800;

/// Default timeout-chunk duration in seconds.
///
/// While speech continues, a chunk is cut and submitted for transcription
/// every time this much un-transcribed audio accumulates.
pub const CHUNK_DURATION_SECS: f64 = 3.0;

/// Default lookback window in seconds.
///
/// When a speech span ends, the trailing portion of the span up to this
/// duration is re-transcribed as one merged chunk to fix boundary errors.
pub const LOOKBACK_DURATION_SECS: f64 = 9.0;

/// Maximum number of recent unconfirmed timeout chunks eligible for
/// replacement by a reprocessing pass.
pub const MAX_RECENT_CHUNKS: usize = 3;

/// Default number of retries after a transient transcription failure.
pub const STT_MAX_RETRIES: u32 = 2;

/// Default backoff schedule between transcription retries, in milliseconds.
pub const STT_RETRY_BACKOFF_MS: [u64; 2] = [500, 1500];

/// Default per-request transcription timeout in milliseconds.
pub const STT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Default number of preceding stable segments concatenated into the prompt
/// for a transcription call.
pub const PROMPT_CONTEXT_SEGMENTS: usize = 2;

/// Default capacity of the per-session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Multiple of the chunk duration the ingest buffer may grow to during
/// confirmed silence before it is trimmed.
pub const IDLE_BUFFER_CHUNKS: u64 = 2;
