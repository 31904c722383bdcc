//! Segment scheduling state machine.
//!
//! Decides chunk boundaries: periodic timeout cuts while speech continues,
//! and a lookback-based reprocessing cut when speech ends. Cutting is driven
//! by stream positions, never wall clock, so the boundary arithmetic is
//! deterministic for a given event sequence.

use crate::streaming::types::PendingChunk;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Configuration for the segment scheduler, in samples.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Timeout-chunk duration.
    pub chunk_samples: u64,
    /// Lookback window re-transcribed when speech ends.
    pub lookback_samples: u64,
    /// Maximum chunks retained for replacement by a reprocessing pass.
    pub max_recent_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InSpeech {
        /// Start of the current speech span.
        segment_start: u64,
        /// End of the last cut, i.e. start of un-cut audio.
        next_cut: u64,
    },
}

/// A timeout chunk still eligible for replacement.
#[derive(Debug, Clone, Copy)]
struct WindowedChunk {
    id: u64,
    start: u64,
    end: u64,
}

/// Chunk-boundary state machine (`Idle` / `InSpeech`).
pub struct SegmentScheduler {
    config: SchedulerConfig,
    state: State,
    /// Recent unconfirmed timeout chunks, oldest first. Evicted chunks are
    /// permanently committed and can no longer be replaced.
    window: VecDeque<WindowedChunk>,
    next_chunk_id: u64,
}

impl SegmentScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            window: VecDeque::new(),
            next_chunk_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_chunk_id;
        self.next_chunk_id += 1;
        id
    }

    /// Enters the speech span starting at `at`.
    pub fn on_speech_start(&mut self, at: u64) {
        if let State::InSpeech { segment_start, .. } = self.state {
            warn!(segment_start, at, "speech start while already in a span, ignoring");
            return;
        }
        self.window.clear();
        self.state = State::InSpeech {
            segment_start: at,
            next_cut: at,
        };
        debug!(at, "speech span started");
    }

    /// Cuts timeout chunks for all complete chunk durations up to
    /// `speech_edge`, returning them oldest first.
    pub fn poll(&mut self, speech_edge: u64) -> Vec<PendingChunk> {
        let State::InSpeech {
            segment_start,
            mut next_cut,
        } = self.state
        else {
            return Vec::new();
        };

        let mut chunks = Vec::new();
        while speech_edge.saturating_sub(next_cut) >= self.config.chunk_samples {
            let start = next_cut;
            let end = start + self.config.chunk_samples;
            let id = self.next_id();

            self.window.push_back(WindowedChunk { id, start, end });
            if self.window.len() > self.config.max_recent_chunks {
                // Oldest chunk leaves the window: it is now committed for good.
                self.window.pop_front();
            }

            chunks.push(PendingChunk {
                id,
                start,
                end,
                is_timeout: true,
                replaces: Vec::new(),
            });
            next_cut = end;
        }

        if !chunks.is_empty() {
            self.state = State::InSpeech {
                segment_start,
                next_cut,
            };
        }
        chunks
    }

    /// Ends the current span at `end` and plans the final cut.
    ///
    /// Returns the reprocessing chunk (replacing the window entries at or
    /// after the lookback boundary), or the whole/trailing span when no
    /// replacement applies, or `None` for an empty span.
    pub fn on_speech_end(&mut self, end: u64) -> Option<PendingChunk> {
        let State::InSpeech {
            segment_start,
            next_cut,
        } = self.state
        else {
            warn!(end, "speech end without an active span, ignoring");
            return None;
        };

        self.state = State::Idle;
        let window: Vec<WindowedChunk> = self.window.drain(..).collect();

        if end <= segment_start {
            warn!(segment_start, end, "empty speech span, nothing to cut");
            return None;
        }
        let duration = end - segment_start;

        let (start, replaces) = if window.is_empty() {
            // Span shorter than one chunk: this is the only transcription
            // call for the span.
            (segment_start, Vec::new())
        } else if duration <= self.config.lookback_samples {
            // Re-transcribe the whole span, superseding every retained chunk.
            (
                window[0].start,
                window.iter().map(|c| c.id).collect::<Vec<_>>(),
            )
        } else {
            let target = end - self.config.lookback_samples;
            match window.iter().position(|c| c.start >= target) {
                Some(pos) => (
                    // Earliest cut point at or after the lookback target; an
                    // exact hit on a boundary uses that boundary.
                    window[pos].start,
                    window[pos..].iter().map(|c| c.id).collect::<Vec<_>>(),
                ),
                // Every boundary is older than the lookback window: only the
                // trailing un-cut audio gets a (first-time) transcription.
                None => (next_cut, Vec::new()),
            }
        };

        let start = if start < segment_start {
            warn!(
                start,
                segment_start, "reprocessing boundary before span start, clamping"
            );
            segment_start
        } else {
            start
        };

        if start >= end {
            debug!(start, end, "nothing left to transcribe at span end");
            return None;
        }

        let id = self.next_id();
        debug!(
            id,
            start,
            end,
            replaced = replaces.len(),
            "speech span ended, cutting final chunk"
        );
        Some(PendingChunk {
            id,
            start,
            end,
            is_timeout: false,
            replaces,
        })
    }

    /// Earliest offset that must stay buffered for a possible reprocess;
    /// `None` while idle.
    pub fn retain_watermark(&self) -> Option<u64> {
        match self.state {
            State::Idle => None,
            State::InSpeech { segment_start, .. } => Some(
                self.window
                    .front()
                    .map(|c| c.start)
                    .unwrap_or(segment_start),
            ),
        }
    }

    /// True when no speech span is active.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Number of chunks currently eligible for replacement.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Returns to idle, dropping the window. Chunk ids keep increasing.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.window.clear();
    }
}
