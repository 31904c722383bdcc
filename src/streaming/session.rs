//! Per-session streaming driver.
//!
//! Owns the ingest buffer, voice-activity tracker, segment scheduler,
//! transcription coordinator and result timeline for one audio stream, and
//! exposes the session control surface: `start`, `stop`, `reset`,
//! `push_frame`, plus `snapshot`/`subscribe` for consumers.
//!
//! Sessions are plain values; nothing here is process-global, so any number
//! of sessions can run side by side and one session's STT outage never
//! affects another.

use crate::audio::buffer::IngestBuffer;
use crate::audio::vad::{
    SpeechClassifier, SpeechEvent, SpeechState, TrackerConfig, VoiceActivityTracker,
};
use crate::audio::wav::write_wav_file;
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::stt::client::SttClient;
use crate::streaming::coordinator::{CoordinatorConfig, TranscriptionCoordinator};
use crate::streaming::scheduler::{SchedulerConfig, SegmentScheduler};
use crate::streaming::timeline::ResultTimeline;
use crate::streaming::types::{PendingChunk, SessionEvent, SessionStats, TranscriptSegment};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One live transcription session.
pub struct StreamingSession<C: SpeechClassifier> {
    config: Config,
    chunk_samples: u64,
    buffer: IngestBuffer,
    tracker: VoiceActivityTracker<C>,
    scheduler: SegmentScheduler,
    coordinator: TranscriptionCoordinator,
    timeline: Arc<Mutex<ResultTimeline>>,
    events: broadcast::Sender<SessionEvent>,
    /// Complete session audio, kept only when the recording archive is
    /// enabled.
    recording: Vec<i16>,
    running: bool,
    chunks_submitted: u64,
}

impl<C: SpeechClassifier> StreamingSession<C> {
    /// Creates a session. The configuration is validated here and again on
    /// `start`.
    pub fn new(config: Config, classifier: C, stt: Arc<dyn SttClient>) -> Result<Self> {
        config.validate()?;

        let timeline = Arc::new(Mutex::new(ResultTimeline::new()));
        let (events, _) = broadcast::channel(defaults::EVENT_CHANNEL_CAPACITY);

        let tracker = VoiceActivityTracker::new(
            TrackerConfig {
                sample_rate: config.audio.sample_rate,
                hop_size: config.audio.hop_size,
                silence_confirm_ms: config.segmentation.silence_confirm_ms,
            },
            classifier,
        );
        let scheduler = SegmentScheduler::new(SchedulerConfig {
            chunk_samples: config.chunk_samples(),
            lookback_samples: config.lookback_samples(),
            max_recent_chunks: config.segmentation.max_recent_chunks,
        });
        let coordinator = TranscriptionCoordinator::new(
            stt,
            CoordinatorConfig::from_config(&config),
            Arc::clone(&timeline),
            events.clone(),
        );

        Ok(Self {
            chunk_samples: config.chunk_samples(),
            buffer: IngestBuffer::new(config.audio.sample_rate),
            tracker,
            scheduler,
            coordinator,
            timeline,
            events,
            recording: Vec::new(),
            running: false,
            chunks_submitted: 0,
            config,
        })
    }

    /// Starts accepting frames.
    pub fn start(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.running {
            warn!("session already started");
            return Ok(());
        }
        self.running = true;
        info!(
            sample_rate = self.config.audio.sample_rate,
            chunk_secs = self.config.segmentation.chunk_duration_secs,
            lookback_secs = self.config.segmentation.lookback_duration_secs,
            "session started"
        );
        Ok(())
    }

    /// Feeds one frame of mono 16-bit PCM samples.
    ///
    /// Runs voice-activity tracking inline, cuts any due timeout chunks, and
    /// plans the reprocessing pass when a speech end is confirmed. Never
    /// blocks on transcription; must be called within a tokio runtime.
    pub fn push_frame(&mut self, samples: &[i16]) -> Result<()> {
        if !self.running {
            warn!("frame pushed while session not running, ignoring");
            return Ok(());
        }

        self.buffer.append(samples);
        if self.config.recording.save_dir.is_some() {
            self.recording.extend_from_slice(samples);
        }

        let observation = self.tracker.observe(samples);

        for event in &observation.events {
            match *event {
                SpeechEvent::Started { at, probability } => {
                    debug!(at, probability, "speech started");
                    self.scheduler.on_speech_start(at);
                    let _ = self.events.send(SessionEvent::SpeechStarted {
                        at_secs: self.secs(at),
                    });
                }
                SpeechEvent::Ended { at, duration_ms } => {
                    debug!(at, duration_ms, "speech ended");
                    // Cuts that became due before the end commit first.
                    for chunk in self.scheduler.poll(at) {
                        self.submit(chunk);
                    }
                    if let Some(chunk) = self.scheduler.on_speech_end(at) {
                        self.submit(chunk);
                    }
                    // The span's audio is fully consumed now.
                    self.buffer.discard_through(at);
                    let _ = self.events.send(SessionEvent::SpeechEnded {
                        at_secs: self.secs(at),
                        duration_ms,
                    });
                }
            }
        }

        if observation.state == SpeechState::Speaking {
            // speech_edge stops at an unconfirmed silence onset, so no chunk
            // ever extends past a later-confirmed speech end.
            for chunk in self.scheduler.poll(self.tracker.speech_edge()) {
                self.submit(chunk);
            }
            if let Some(watermark) = self.scheduler.retain_watermark() {
                self.buffer.discard_through(watermark);
            }
        } else if self.scheduler.is_idle() {
            // Bound memory during long silence, keeping enough tail for the
            // next span's first chunk.
            let cap = self.chunk_samples * defaults::IDLE_BUFFER_CHUNKS;
            if self.buffer.len() as u64 > cap {
                self.buffer.trim_to_tail(self.chunk_samples);
            }
        }

        Ok(())
    }

    fn submit(&mut self, chunk: PendingChunk) {
        let audio = self.buffer.extract(chunk.start, chunk.end);
        if audio.is_empty() {
            warn!(
                chunk = chunk.id,
                start = chunk.start,
                end = chunk.end,
                "chunk audio no longer retained, skipping"
            );
            return;
        }
        self.chunks_submitted += 1;
        self.coordinator.submit(chunk, audio);
    }

    /// Stops the session: discards pending chunks without committing, keeps
    /// the committed timeline readable, and writes the recording archive when
    /// enabled. Returns the archive path, if one was written.
    pub fn stop(&mut self) -> Result<Option<PathBuf>> {
        if !self.running {
            warn!("session not running");
            return Ok(None);
        }
        self.running = false;

        self.coordinator.discard_inflight();
        lock(&self.timeline).clear_all_pending_replacements();
        self.scheduler.reset();
        self.tracker.reset();
        self.buffer.clear();

        let archive = self.write_recording()?;
        self.recording.clear();

        info!("session stopped");
        Ok(archive)
    }

    fn write_recording(&self) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.config.recording.save_dir else {
            return Ok(None);
        };
        if self.recording.is_empty() {
            return Ok(None);
        }
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = dir.join(format!("session-{}.wav", epoch_ms));
        write_wav_file(&path, self.config.audio.sample_rate, &self.recording)?;
        info!(
            path = %path.display(),
            secs = self.recording.len() as f64 / self.config.audio.sample_rate as f64,
            "session recording saved"
        );
        Ok(Some(path))
    }

    /// Full teardown: like `stop`, but also clears the timeline and the
    /// fatal-halt state, returning the session to a fresh configuration.
    pub fn reset(&mut self) {
        self.running = false;
        self.coordinator.discard_inflight();
        self.coordinator.clear_halt();
        self.scheduler.reset();
        self.tracker.reset();
        self.buffer.clear();
        self.recording.clear();
        lock(&self.timeline).clear();
        info!("session reset");
    }

    /// Ordered copy of the committed transcript.
    pub fn snapshot(&self) -> Vec<TranscriptSegment> {
        lock(&self.timeline).snapshot()
    }

    /// Subscribes to the session event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            is_running: self.running,
            ingested_secs: self.buffer.end_offset() as f64 / self.config.audio.sample_rate as f64,
            chunks_submitted: self.chunks_submitted,
            segments_committed: lock(&self.timeline).len(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn secs(&self, offset: u64) -> f64 {
        offset as f64 / self.config.audio.sample_rate as f64
    }
}
