//! Transcription coordination.
//!
//! Issues the external STT call per chunk with prompt context, applies the
//! timeout/retry policy, filters results superseded by reprocessing, and
//! commits segments to the timeline strictly in start order regardless of
//! completion order.

use crate::config::Config;
use crate::stt::client::{SttClient, SttError, SttResponse};
use crate::streaming::timeline::ResultTimeline;
use crate::streaming::types::{PendingChunk, SessionEvent, TranscriptSegment};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Transcription call policy.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub sample_rate: u32,
    /// Retries after a transient failure (attempts = retries + 1).
    pub max_retries: u32,
    /// Backoff before each retry; the last entry repeats.
    pub retry_backoff: Vec<Duration>,
    /// Bounded wait per STT call before the retry path triggers.
    pub request_timeout: Duration,
    /// Number of preceding stable segments used as prompt context.
    pub prompt_segments: usize,
}

impl CoordinatorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            max_retries: config.stt.max_retries,
            retry_backoff: config
                .stt
                .retry_backoff_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
            request_timeout: Duration::from_millis(config.stt.request_timeout_ms),
            prompt_segments: config.stt.prompt_context_segments,
        }
    }
}

/// A resolved chunk waiting for its turn to commit.
struct Resolved {
    chunk: PendingChunk,
    text: String,
}

/// Commit bookkeeping, keyed by `(start, id)` so commits happen strictly in
/// start order.
#[derive(Default)]
struct Ledger {
    /// Outstanding chunks (submitted, not yet committed or dropped).
    pending: BTreeSet<(u64, u64)>,
    /// Start offset per outstanding chunk id.
    starts: HashMap<u64, u64>,
    /// Resolved results blocked behind an earlier outstanding chunk.
    ready: BTreeMap<(u64, u64), Resolved>,
    /// Ids whose results must be dropped if they ever resolve: chunks
    /// superseded by a committed reprocessing pass.
    superseded: HashSet<u64>,
    /// Bumped on stop/reset; results from older generations are dropped.
    generation: u64,
    /// Set after a fatal STT failure; cleared on reset.
    halted: bool,
}

/// Per-session transcription coordinator.
///
/// Cloneable across tasks via internal `Arc`s; all methods take `&self`.
pub struct TranscriptionCoordinator {
    client: Arc<dyn SttClient>,
    config: CoordinatorConfig,
    timeline: Arc<Mutex<ResultTimeline>>,
    events: broadcast::Sender<SessionEvent>,
    ledger: Arc<Mutex<Ledger>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TranscriptionCoordinator {
    pub fn new(
        client: Arc<dyn SttClient>,
        config: CoordinatorConfig,
        timeline: Arc<Mutex<ResultTimeline>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            client,
            config,
            timeline,
            events,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Submits a chunk for transcription.
    ///
    /// Marks the chunk's `replaces` as pending replacement, derives the
    /// prompt from stable segments before the chunk start, and spawns the
    /// call. Must be called from within a tokio runtime.
    pub fn submit(&self, chunk: PendingChunk, audio: Vec<i16>) {
        let generation = {
            let mut ledger = lock(&self.ledger);
            if ledger.halted {
                warn!(chunk = chunk.id, "coordinator halted, dropping chunk");
                return;
            }
            ledger.pending.insert((chunk.start, chunk.id));
            ledger.starts.insert(chunk.id, chunk.start);
            ledger.generation
        };

        let prompt = {
            let mut timeline = lock(&self.timeline);
            if !chunk.replaces.is_empty() {
                timeline.mark_pending_replacement(&chunk.replaces);
            }
            timeline.prompt_context(chunk.start, self.config.prompt_segments)
        };

        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let timeline = Arc::clone(&self.timeline);
        let events = self.events.clone();
        let ledger = Arc::clone(&self.ledger);

        tokio::spawn(async move {
            let outcome =
                Self::transcribe_with_retry(&*client, &config, &chunk, &audio, &prompt).await;
            Self::resolve(
                generation, chunk, outcome, &ledger, &timeline, &events,
            );
        });
    }

    /// Runs one chunk through the timeout/retry policy.
    async fn transcribe_with_retry(
        client: &dyn SttClient,
        config: &CoordinatorConfig,
        chunk: &PendingChunk,
        audio: &[i16],
        prompt: &str,
    ) -> Result<SttResponse, SttError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::time::timeout(
                config.request_timeout,
                client.transcribe(audio, config.sample_rate, prompt),
            )
            .await;

            let error = match result {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => SttError::Transient(format!(
                    "request timed out after {:?}",
                    config.request_timeout
                )),
            };

            if attempt >= config.max_retries {
                return Err(error);
            }

            let backoff = config
                .retry_backoff
                .get(attempt as usize)
                .or(config.retry_backoff.last())
                .copied()
                .unwrap_or(Duration::from_millis(500));
            debug!(
                chunk = chunk.id,
                attempt,
                error = %error,
                backoff_ms = backoff.as_millis() as u64,
                "transient transcription failure, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Applies one finished call to the ledger and drains ordered commits.
    fn resolve(
        generation: u64,
        chunk: PendingChunk,
        outcome: Result<SttResponse, SttError>,
        ledger: &Mutex<Ledger>,
        timeline: &Mutex<ResultTimeline>,
        events: &broadcast::Sender<SessionEvent>,
    ) {
        let mut ledger = lock(ledger);

        if ledger.generation != generation {
            debug!(chunk = chunk.id, "dropping result from a torn-down session");
            return;
        }

        if ledger.superseded.remove(&chunk.id) {
            debug!(chunk = chunk.id, "dropping superseded transcription result");
            ledger.pending.remove(&(chunk.start, chunk.id));
            ledger.starts.remove(&chunk.id);
            Self::drain(&mut ledger, timeline, events);
            return;
        }

        let text = match outcome {
            Ok(response) => response.text,
            Err(error) if error.is_fatal() => {
                warn!(chunk = chunk.id, error = %error, "fatal transcription failure, halting session submissions");
                ledger.halted = true;
                ledger.pending.remove(&(chunk.start, chunk.id));
                ledger.starts.remove(&chunk.id);
                // The replacement will never arrive; the targeted segments
                // stay committed and become stable again.
                if !chunk.replaces.is_empty() {
                    lock(timeline).clear_pending_replacement(&chunk.replaces);
                }
                let _ = events.send(SessionEvent::SttFatal {
                    message: error.to_string(),
                });
                Self::drain(&mut ledger, timeline, events);
                return;
            }
            Err(error) => {
                // Retries exhausted: commit an empty span so the timeline
                // keeps full time coverage, and report once.
                warn!(chunk = chunk.id, error = %error, "transcription retries exhausted, committing empty segment");
                let _ = events.send(SessionEvent::SttWarning {
                    chunk_id: chunk.id,
                    message: error.to_string(),
                });
                String::new()
            }
        };

        ledger
            .ready
            .insert((chunk.start, chunk.id), Resolved { chunk, text });
        Self::drain(&mut ledger, timeline, events);
    }

    /// Commits every resolved chunk that has become the earliest outstanding
    /// one, in order.
    fn drain(
        ledger: &mut Ledger,
        timeline: &Mutex<ResultTimeline>,
        events: &broadcast::Sender<SessionEvent>,
    ) {
        loop {
            let Some(&first) = ledger.pending.iter().next() else {
                break;
            };
            let Some(resolved) = ledger.ready.remove(&first) else {
                break;
            };
            ledger.pending.remove(&first);
            ledger.starts.remove(&resolved.chunk.id);
            Self::commit(ledger, resolved, timeline, events);
        }
    }

    fn commit(
        ledger: &mut Ledger,
        resolved: Resolved,
        timeline: &Mutex<ResultTimeline>,
        events: &broadcast::Sender<SessionEvent>,
    ) {
        let chunk = resolved.chunk;
        let segment = TranscriptSegment {
            id: chunk.id,
            start: chunk.start,
            end: chunk.end,
            text: resolved.text,
            is_reprocessed: !chunk.replaces.is_empty(),
            replaces: chunk.replaces.clone(),
        };

        {
            let mut timeline = lock(timeline);
            timeline.commit(segment.clone(), &chunk.replaces);
            if !chunk.replaces.is_empty() {
                timeline.clear_pending_replacement(&chunk.replaces);
            }
        }

        // A committed reprocess invalidates still-outstanding results for the
        // chunks it replaced; they resolve later and are dropped silently.
        for &replaced in &chunk.replaces {
            if let Some(start) = ledger.starts.remove(&replaced) {
                let key = (start, replaced);
                ledger.pending.remove(&key);
                if ledger.ready.remove(&key).is_none() {
                    ledger.superseded.insert(replaced);
                }
            }
        }

        debug!(
            segment = segment.id,
            start = segment.start,
            end = segment.end,
            reprocessed = segment.is_reprocessed,
            "segment committed"
        );
        let _ = events.send(SessionEvent::Transcript(segment));
    }

    /// Discards all in-flight work: results from calls already running are
    /// dropped when they resolve. Used on session stop and reset.
    pub fn discard_inflight(&self) {
        let mut ledger = lock(&self.ledger);
        ledger.generation += 1;
        ledger.pending.clear();
        ledger.starts.clear();
        ledger.ready.clear();
        ledger.superseded.clear();
    }

    /// Clears the fatal-halt flag (session reconfigured/reset).
    pub fn clear_halt(&self) {
        lock(&self.ledger).halted = false;
    }

    /// True after a fatal STT failure until the session is reset.
    pub fn is_halted(&self) -> bool {
        lock(&self.ledger).halted
    }

    /// Number of submitted chunks not yet committed or dropped.
    pub fn inflight_len(&self) -> usize {
        lock(&self.ledger).pending.len()
    }
}
