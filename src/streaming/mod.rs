//! Streaming transcription engine.
//!
//! Per-session flow: ingest buffer → voice-activity tracking → segment
//! scheduling → transcription coordination → result timeline. Audio ingest
//! never blocks on transcription; results are reconciled in start order as
//! the asynchronous calls complete.

pub mod coordinator;
pub mod scheduler;
pub mod session;
pub mod timeline;
pub mod types;

pub use coordinator::{CoordinatorConfig, TranscriptionCoordinator};
pub use scheduler::{SchedulerConfig, SegmentScheduler};
pub use session::StreamingSession;
pub use timeline::ResultTimeline;
pub use types::{PendingChunk, SessionEvent, SessionStats, TranscriptSegment};
