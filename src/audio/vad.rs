//! Voice-activity tracking.
//!
//! Wraps an external per-hop speech classifier into a hysteresis-smoothed
//! two-state signal. A silent-to-speaking transition commits immediately; a
//! speaking-to-silent transition commits only once silence has persisted for
//! the configured confirmation window, and any speech hop in between cancels
//! the pending end.
//!
//! All timing is derived from sample offsets, not wall clock, so transitions
//! are deterministic for a given input stream.

use crate::defaults;
use crate::error::Result;
use tracing::warn;

/// Per-hop output of the external classifier.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    /// Whether the hop contains speech.
    pub is_speech: bool,
    /// Detector confidence (0.0 to 1.0).
    pub probability: f32,
}

/// External voice-activity boundary: one call per fixed-size hop.
///
/// A failed call degrades that hop to silence; it never produces false
/// speech and never aborts the session.
pub trait SpeechClassifier: Send {
    fn classify(&mut self, frame: &[i16], sample_rate: u32) -> Result<Classification>;
}

/// Energy-based classifier over normalized RMS.
///
/// The fallback detector: cheap, deterministic, adequate for tests and for
/// environments without a model-based VAD.
#[derive(Debug, Clone, Copy)]
pub struct RmsClassifier {
    threshold: f32,
}

impl RmsClassifier {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for RmsClassifier {
    fn default() -> Self {
        Self::new(defaults::VAD_THRESHOLD)
    }
}

impl SpeechClassifier for RmsClassifier {
    fn classify(&mut self, frame: &[i16], _sample_rate: u32) -> Result<Classification> {
        let rms = calculate_rms(frame);
        Ok(Classification {
            is_speech: rms > self.threshold,
            probability: rms,
        })
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value (0.0 to 1.0) where 0.0 is silence and 1.0 is
/// maximum amplitude.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Smoothed two-state speech signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    Silent,
    Speaking,
}

/// Confirmed transition events. Offsets are absolute sample positions from
/// session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeechEvent {
    /// Speech began at `at`.
    Started { at: u64, probability: f32 },
    /// Speech ended at `at` (the silence onset, confirmed after the
    /// configured window of continuous silence).
    Ended { at: u64, duration_ms: u64 },
}

/// Configuration for the voice-activity tracker.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub sample_rate: u32,
    /// Classifier hop size in samples.
    pub hop_size: usize,
    /// Continuous silence required to confirm a speech end, in ms.
    pub silence_confirm_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            hop_size: defaults::HOP_SIZE,
            silence_confirm_ms: defaults::SILENCE_CONFIRM_MS,
        }
    }
}

/// Result of feeding one frame to the tracker.
#[derive(Debug, Clone)]
pub struct Observation {
    pub state: SpeechState,
    /// Whether a transition committed during this frame.
    pub changed: bool,
    /// Transitions committed during this frame, in stream order.
    pub events: Vec<SpeechEvent>,
}

/// Hysteresis state machine over an external classifier.
pub struct VoiceActivityTracker<C: SpeechClassifier> {
    config: TrackerConfig,
    classifier: C,
    state: SpeechState,
    /// Residual samples below one hop, waiting for completion.
    pending: Vec<i16>,
    /// Absolute offset of the next unclassified sample.
    cursor: u64,
    speech_start: Option<u64>,
    /// Onset of the current unconfirmed silence run.
    silence_start: Option<u64>,
    confirm_samples: u64,
}

impl<C: SpeechClassifier> VoiceActivityTracker<C> {
    pub fn new(config: TrackerConfig, classifier: C) -> Self {
        let confirm_samples =
            config.silence_confirm_ms * config.sample_rate as u64 / 1000;
        Self {
            config,
            classifier,
            state: SpeechState::Silent,
            pending: Vec::new(),
            cursor: 0,
            speech_start: None,
            silence_start: None,
            confirm_samples,
        }
    }

    /// Feeds a frame of samples, classifying every completed hop and
    /// committing any resulting transitions.
    pub fn observe(&mut self, samples: &[i16]) -> Observation {
        self.pending.extend_from_slice(samples);

        let hop = self.config.hop_size;
        let mut events = Vec::new();

        while self.pending.len() >= hop {
            let frame: Vec<i16> = self.pending.drain(..hop).collect();
            let hop_start = self.cursor;
            self.cursor += hop as u64;

            let classification = match self.classifier.classify(&frame, self.config.sample_rate) {
                Ok(result) => result,
                Err(e) => {
                    // Fail-safe: a classifier error is silence, never speech.
                    warn!(error = %e, "classifier failed, treating hop as silence");
                    Classification {
                        is_speech: false,
                        probability: 0.0,
                    }
                }
            };

            if let Some(event) = self.advance(hop_start, classification) {
                events.push(event);
            }
        }

        Observation {
            state: self.state,
            changed: !events.is_empty(),
            events,
        }
    }

    /// Applies one classified hop to the state machine.
    fn advance(&mut self, hop_start: u64, result: Classification) -> Option<SpeechEvent> {
        match self.state {
            SpeechState::Silent => {
                if result.is_speech {
                    self.state = SpeechState::Speaking;
                    self.speech_start = Some(hop_start);
                    self.silence_start = None;
                    return Some(SpeechEvent::Started {
                        at: hop_start,
                        probability: result.probability,
                    });
                }
                None
            }
            SpeechState::Speaking => {
                if result.is_speech {
                    self.silence_start = None;
                    return None;
                }
                let onset = *self.silence_start.get_or_insert(hop_start);
                let hop_end = hop_start + self.config.hop_size as u64;
                if hop_end - onset >= self.confirm_samples {
                    let started = self.speech_start.unwrap_or(onset);
                    self.state = SpeechState::Silent;
                    self.speech_start = None;
                    self.silence_start = None;
                    return Some(SpeechEvent::Ended {
                        at: onset,
                        duration_ms: (onset - started) * 1000 / self.config.sample_rate as u64,
                    });
                }
                None
            }
        }
    }

    /// Current smoothed state.
    pub fn state(&self) -> SpeechState {
        self.state
    }

    /// Latest offset known to contain speech: while a silence run is pending
    /// confirmation this is its onset, otherwise the classification cursor.
    ///
    /// Chunk cutting never goes past this edge, so no chunk extends beyond a
    /// later-confirmed speech end.
    pub fn speech_edge(&self) -> u64 {
        self.silence_start.unwrap_or(self.cursor)
    }

    /// Absolute offset of the next unclassified sample.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Resets to silent, dropping residual samples. The cursor keeps
    /// advancing monotonically.
    pub fn reset(&mut self) {
        self.cursor += self.pending.len() as u64;
        self.pending.clear();
        self.state = SpeechState::Silent;
        self.speech_start = None;
        self.silence_start = None;
    }
}
