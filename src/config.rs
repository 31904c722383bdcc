use crate::defaults;
use crate::error::{Result, StreamscribeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmentation: SegmentationConfig,
    pub stt: SttConfig,
    pub recording: RecordingConfig,
}

/// Audio ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Classifier hop size in samples.
    pub hop_size: usize,
    /// RMS threshold for the built-in energy classifier.
    pub vad_threshold: f32,
}

/// Speech segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Timeout-chunk duration in seconds.
    pub chunk_duration_secs: f64,
    /// Lookback window re-transcribed when a speech span ends, in seconds.
    pub lookback_duration_secs: f64,
    /// Continuous silence required to confirm the end of speech, in ms.
    pub silence_confirm_ms: u64,
    /// Maximum number of recent timeout chunks eligible for replacement.
    pub max_recent_chunks: usize,
}

/// Transcription call policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Retries after a transient failure (attempts = retries + 1).
    pub max_retries: u32,
    /// Backoff before each retry, in milliseconds. The last entry repeats if
    /// there are more retries than entries.
    pub retry_backoff_ms: Vec<u64>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Number of preceding stable segments used as prompt context.
    pub prompt_context_segments: usize,
}

/// Session recording archive configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory where complete session recordings are written on stop.
    /// `None` disables the archive.
    pub save_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            hop_size: defaults::HOP_SIZE,
            vad_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: defaults::CHUNK_DURATION_SECS,
            lookback_duration_secs: defaults::LOOKBACK_DURATION_SECS,
            silence_confirm_ms: defaults::SILENCE_CONFIRM_MS,
            max_recent_chunks: defaults::MAX_RECENT_CHUNKS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::STT_MAX_RETRIES,
            retry_backoff_ms: defaults::STT_RETRY_BACKOFF_MS.to_vec(),
            request_timeout_ms: defaults::STT_REQUEST_TIMEOUT_MS,
            prompt_context_segments: defaults::PROMPT_CONTEXT_SEGMENTS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StreamscribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                StreamscribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file is
    /// missing. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(StreamscribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMSCRIBE_SAMPLE_RATE → audio.sample_rate
    /// - STREAMSCRIBE_CHUNK_SECS → segmentation.chunk_duration_secs
    /// - STREAMSCRIBE_RECORDING_DIR → recording.save_dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(rate) = std::env::var("STREAMSCRIBE_SAMPLE_RATE") {
            if let Ok(rate) = rate.parse() {
                self.audio.sample_rate = rate;
            }
        }

        if let Ok(secs) = std::env::var("STREAMSCRIBE_CHUNK_SECS") {
            if let Ok(secs) = secs.parse() {
                self.segmentation.chunk_duration_secs = secs;
            }
        }

        if let Ok(dir) = std::env::var("STREAMSCRIBE_RECORDING_DIR") {
            if !dir.is_empty() {
                self.recording.save_dir = Some(PathBuf::from(dir));
            }
        }

        self
    }

    /// Validates every numeric parameter. Called at session start.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> StreamscribeError {
            StreamscribeError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.hop_size == 0 {
            return Err(invalid("audio.hop_size", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.audio.vad_threshold) {
            return Err(invalid("audio.vad_threshold", "must be within 0.0..=1.0"));
        }
        if !self.segmentation.chunk_duration_secs.is_finite()
            || self.segmentation.chunk_duration_secs <= 0.0
        {
            return Err(invalid(
                "segmentation.chunk_duration_secs",
                "must be positive",
            ));
        }
        if !self.segmentation.lookback_duration_secs.is_finite()
            || self.segmentation.lookback_duration_secs <= 0.0
        {
            return Err(invalid(
                "segmentation.lookback_duration_secs",
                "must be positive",
            ));
        }
        if self.segmentation.silence_confirm_ms == 0 {
            return Err(invalid("segmentation.silence_confirm_ms", "must be positive"));
        }
        if self.segmentation.max_recent_chunks == 0 {
            return Err(invalid(
                "segmentation.max_recent_chunks",
                "must be at least 1",
            ));
        }
        if self.stt.request_timeout_ms == 0 {
            return Err(invalid("stt.request_timeout_ms", "must be positive"));
        }
        if self.stt.max_retries > 0 && self.stt.retry_backoff_ms.is_empty() {
            return Err(invalid(
                "stt.retry_backoff_ms",
                "must not be empty when max_retries > 0",
            ));
        }
        Ok(())
    }

    /// Timeout-chunk duration in samples.
    pub fn chunk_samples(&self) -> u64 {
        (self.segmentation.chunk_duration_secs * self.audio.sample_rate as f64).round() as u64
    }

    /// Lookback window in samples.
    pub fn lookback_samples(&self) -> u64 {
        (self.segmentation.lookback_duration_secs * self.audio.sample_rate as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.hop_size, 256);
        assert_eq!(config.segmentation.chunk_duration_secs, 3.0);
        assert_eq!(config.segmentation.lookback_duration_secs, 9.0);
        assert_eq!(config.segmentation.silence_confirm_ms, 800);
        assert_eq!(config.segmentation.max_recent_chunks, 3);
        assert_eq!(config.stt.max_retries, 2);
        assert_eq!(config.stt.retry_backoff_ms, vec![500, 1500]);
        assert_eq!(config.stt.prompt_context_segments, 2);
        assert!(config.recording.save_dir.is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_sample_conversions() {
        let config = Config::default();
        assert_eq!(config.chunk_samples(), 48_000);
        assert_eq!(config.lookback_samples(), 144_000);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(
            err,
            StreamscribeError::ConfigFileNotFound { .. }
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[segmentation]\nchunk_duration_secs = 2.5").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.segmentation.chunk_duration_secs, 2.5);
        assert_eq!(config.segmentation.lookback_duration_secs, 9.0);
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "segmentation = nonsense").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_chunk_duration() {
        let mut config = Config::default();
        config.segmentation.chunk_duration_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.segmentation.max_recent_chunks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_backoff() {
        let mut config = Config::default();
        config.stt.retry_backoff_ms.clear();
        assert!(config.validate().is_err());

        config.stt.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        // Serialize env mutation within the test to avoid cross-test races.
        unsafe {
            std::env::set_var("STREAMSCRIBE_CHUNK_SECS", "4.5");
        }
        let config = Config::default().with_env_overrides();
        unsafe {
            std::env::remove_var("STREAMSCRIBE_CHUNK_SECS");
        }
        assert_eq!(config.segmentation.chunk_duration_secs, 4.5);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
